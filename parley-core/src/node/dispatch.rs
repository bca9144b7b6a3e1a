//! Inbound message routing
//!
//! Both listeners feed the same `handle` function. Every envelope advances
//! the Lamport clock first; our own broadcasts echoed back by the group are
//! dropped; the rest is routed by message kind.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::codec;
use crate::error::ParleyError;
use crate::events::NodeEvent;
use crate::history::HistoryEntry;
use crate::membership::{Peer, PeerId};
use crate::message::{
    AssignIdPayload, ChatPayload, Envelope, GoodbyePayload, JoinPayload, Message, PeersPayload,
    TimeAdjustPayload, TimeResponsePayload,
};
use crate::role::{CoordinatorInfo, Role};
use crate::transport::Channel;

use super::core::NodeShared;

/// Sender identity as carried in the envelope
#[derive(Debug, Clone)]
pub(super) struct Origin {
    pub id: Option<PeerId>,
    pub address: SocketAddr,
    pub name: String,
}

impl Origin {
    fn coordinator_info(&self, id: PeerId) -> CoordinatorInfo {
        CoordinatorInfo {
            id,
            address: self.address,
            name: self.name.clone(),
        }
    }
}

impl NodeShared {
    pub(super) fn spawn_listener(self: &Arc<Self>, channel: Channel) {
        let shared = Arc::clone(self);
        let mut shutdown = self.shutdown_signal();

        self.spawn(async move {
            tracing::debug!("{} listener started", channel);
            loop {
                let received = tokio::select! {
                    _ = shutdown.changed() => break,
                    received = shared.transport.recv(channel) => received,
                };

                match received {
                    Ok((bytes, from)) => match codec::decode(&bytes) {
                        Ok(envelope) => shared.handle(envelope, channel).await,
                        Err(e) => tracing::warn!("Dropping datagram from {}: {}", from, e),
                    },
                    Err(e) => {
                        if !shared.is_running() {
                            break;
                        }
                        if matches!(e, ParleyError::TransportClosed) {
                            tracing::warn!("{} transport closed unexpectedly", channel);
                            break;
                        }
                        tracing::warn!("{} receive error: {}", channel, e);
                    }
                }
            }
            tracing::debug!("{} listener stopped", channel);
        });
    }

    /// Route one inbound envelope
    pub(super) async fn handle(self: &Arc<Self>, envelope: Envelope, channel: Channel) {
        if !self.is_running() {
            return;
        }

        self.lamport.observe(envelope.lamport);

        if channel == Channel::Broadcast && envelope.origin_address == self.address {
            return;
        }

        tracing::trace!(
            "{} from {} ({}) via {}",
            envelope.kind(),
            envelope.origin_name,
            envelope.origin_address,
            channel
        );

        let Envelope {
            origin_id,
            origin_address,
            origin_name,
            lamport,
            message,
        } = envelope;
        let origin = Origin {
            id: origin_id,
            address: origin_address,
            name: origin_name,
        };

        match message {
            Message::Join(payload) => self.on_join(origin, payload).await,
            Message::AssignId(payload) => self.on_assign_id(payload),
            Message::Heartbeat => self.on_heartbeat(origin).await,
            Message::Election => self.on_election(origin).await,
            Message::Ok => self.on_ok(origin),
            Message::Coordinator(payload) => self.on_coordinator(origin, payload),
            Message::Chat(payload) => self.on_chat(origin, lamport, payload),
            Message::TimeRequest => self.on_time_request(origin).await,
            Message::TimeResponse(payload) => self.on_time_response(origin, payload),
            Message::TimeAdjust(payload) => self.on_time_adjust(origin, payload),
            Message::KickVoteStart(payload) => self.on_kick_vote_start(origin, payload),
            Message::KickVote(payload) => self.on_kick_vote(origin, payload),
            Message::KickResult(payload) => self.on_kick_result(origin, payload).await,
            Message::PeersUpdate(payload) => self.on_peers_update(origin, payload),
            Message::PeersRequest => self.on_peers_request(origin).await,
            Message::PeersResponse(payload) => self.apply_snapshot(payload.peers),
            Message::Goodbye(payload) => self.on_goodbye(payload),
            Message::History(entries) => self.on_history(entries),
        }
    }

    pub(super) fn ignore(&self, message_type: &'static str, reason: &str) {
        let violation = ParleyError::protocol_violation(message_type, self.role.role(), reason);
        tracing::debug!("{}", violation);
    }

    async fn on_join(self: &Arc<Self>, origin: Origin, payload: JoinPayload) {
        if !self.role.is_coordinator() {
            return self.ignore("JOIN", "only the coordinator assigns ids");
        }
        let Some(my_id) = self.id() else {
            return self.ignore("JOIN", "coordinator without an id");
        };
        if let Some(banned) = origin.id.filter(|id| self.bans.contains(*id)) {
            tracing::warn!("Refusing JOIN from evicted node {} ({})", origin.name, banned);
            return;
        }

        let (assigned_id, created) =
            self.directory
                .allocate(payload.address, &origin.name, |id| self.bans.contains(id));
        tracing::info!(
            "Assigning id {} to {} ({}){}",
            assigned_id,
            origin.name,
            payload.address,
            if created { "" } else { " again" }
        );

        let reply = AssignIdPayload {
            assigned_id,
            coordinator_id: my_id,
            coordinator_address: self.address,
            coordinator_name: self.name.clone(),
            peers: self.directory.snapshot(),
            history: self.history.entries(),
        };
        self.send_to(payload.address, Message::AssignId(reply)).await;

        if created {
            self.emit(NodeEvent::PeerJoined(Peer::new(
                assigned_id,
                payload.address,
                origin.name,
            )));
            self.broadcast_peers_update().await;
        }
    }

    fn on_assign_id(&self, payload: AssignIdPayload) {
        if let Some(current) = self.id() {
            if current != payload.assigned_id {
                tracing::warn!(
                    "Ignoring ASSIGN_ID {}: already joined as {}",
                    payload.assigned_id,
                    current
                );
            }
            return;
        }

        let id = payload.assigned_id;
        self.set_id(id);
        self.apply_snapshot(payload.peers);
        let added = self.history.merge(payload.history);

        let coordinator = CoordinatorInfo {
            id: payload.coordinator_id,
            address: payload.coordinator_address,
            name: payload.coordinator_name,
        };
        let name = coordinator.name.clone();
        self.role.adopt(coordinator, Some(id));
        self.heartbeat.reset();

        tracing::info!(
            "Received id {} from coordinator {} ({} peers, {} history entries)",
            id,
            name,
            self.directory.len(),
            added
        );

        self.emit(NodeEvent::Joined {
            id,
            coordinator: false,
        });
        self.emit(NodeEvent::CoordinatorChanged {
            id: payload.coordinator_id,
            name,
            is_self: false,
        });
        self.assigned.notify_waiters();
    }

    async fn on_heartbeat(self: &Arc<Self>, origin: Origin) {
        let Some(sender) = origin.id else {
            return self.ignore("HEARTBEAT", "sender has no id");
        };
        let my_id = self.id();

        if self.role.is_coordinator() {
            match my_id {
                Some(me) if sender > me => {
                    tracing::warn!(
                        "Heartbeat from higher coordinator {} ({}), stepping down",
                        origin.name,
                        sender
                    );
                    self.role.adopt(origin.coordinator_info(sender), my_id);
                    self.heartbeat.reset();
                    self.emit(NodeEvent::CoordinatorChanged {
                        id: sender,
                        name: origin.name.clone(),
                        is_self: false,
                    });
                    self.send_to(origin.address, Message::PeersRequest).await;
                }
                Some(me) if sender < me => {
                    tracing::warn!(
                        "Heartbeat from lower coordinator {} ({}), reasserting",
                        origin.name,
                        sender
                    );
                    self.announce_coordinator().await;
                }
                _ => self.ignore("HEARTBEAT", "sender claims our own id"),
            }
            return;
        }

        let previous = self.role.set_coordinator(origin.coordinator_info(sender));
        self.heartbeat.reset();

        if previous.as_ref().map(|c| c.id) != Some(sender) {
            tracing::info!("Now following coordinator {} ({})", origin.name, sender);
            self.emit(NodeEvent::CoordinatorChanged {
                id: sender,
                name: origin.name.clone(),
                is_self: false,
            });
            if my_id.is_some() {
                self.send_to(origin.address, Message::PeersRequest).await;
            }
        }
    }

    fn on_coordinator(self: &Arc<Self>, origin: Origin, payload: PeersPayload) {
        let Some(coordinator_id) = origin.id else {
            return self.ignore("COORDINATOR", "sender has no id");
        };
        if self.bans.contains(coordinator_id) {
            return self.ignore("COORDINATOR", "sender was evicted");
        }

        if !payload.peers.is_empty() {
            self.apply_snapshot(payload.peers);
        }

        let my_id = self.id();
        let previous = self.role.adopt(origin.coordinator_info(coordinator_id), my_id);
        self.heartbeat.reset();

        if self.role.is_coordinator() {
            if previous != Role::Coordinator {
                self.start_coordinator_loops();
            }
            return;
        }

        tracing::info!("New coordinator: {} ({})", origin.name, coordinator_id);
        self.emit(NodeEvent::CoordinatorChanged {
            id: coordinator_id,
            name: origin.name,
            is_self: false,
        });

        // A lower id must not lead while we are alive
        if my_id.is_some_and(|me| me > coordinator_id) {
            tracing::info!("Announced coordinator {} is below us, challenging", coordinator_id);
            self.trigger_election();
        }
    }

    fn on_chat(&self, origin: Origin, lamport: u64, payload: ChatPayload) {
        let Some(sender) = origin.id else {
            return self.ignore("CHAT", "sender has no id");
        };
        if self.bans.contains(sender) {
            tracing::debug!("Dropping chat from evicted node {}", sender);
            return;
        }

        let entry = HistoryEntry {
            lamport,
            origin_id: sender,
            origin_name: origin.name,
            text: payload.text,
            wall_time: payload.wall_time,
            corrected_time: payload.corrected_time,
        };
        if self.history.append(entry.clone()) {
            self.emit(NodeEvent::ChatReceived(entry));
        }
    }

    async fn on_time_request(&self, origin: Origin) {
        if self.role.is_coordinator() {
            return self.ignore("TIME_REQUEST", "coordinators do not report their clock");
        }
        let local_time = self.time.wall_time();
        self.send_to(
            origin.address,
            Message::TimeResponse(TimeResponsePayload { local_time }),
        )
        .await;
    }

    fn on_time_response(&self, origin: Origin, payload: TimeResponsePayload) {
        if !self.role.is_coordinator() {
            return self.ignore("TIME_RESPONSE", "no sync round is running here");
        }
        let Some(sender) = origin.id else {
            return self.ignore("TIME_RESPONSE", "sender has no id");
        };
        if !self.berkeley.record(sender, payload.local_time) {
            self.ignore("TIME_RESPONSE", "arrived outside the collection window");
        }
    }

    fn on_time_adjust(&self, origin: Origin, payload: TimeAdjustPayload) {
        if self.role.is_coordinator() {
            return self.ignore("TIME_ADJUST", "coordinators adjust themselves");
        }
        if let (Some(expected), Some(sender)) = (self.role.coordinator_id(), origin.id) {
            if expected != sender {
                return self.ignore("TIME_ADJUST", "sender is not our coordinator");
            }
        }

        let offset = self.time.set_offset(payload.correction);
        tracing::info!(
            "Clock adjusted by coordinator: correction {:+.3}s applied as {:+.3}s",
            payload.correction,
            offset
        );
        self.emit(NodeEvent::ClockAdjusted { offset });
    }

    fn on_peers_update(&self, _origin: Origin, payload: PeersPayload) {
        if self.role.is_coordinator() {
            return self.ignore("PEERS_UPDATE", "the coordinator owns the directory");
        }
        self.apply_snapshot(payload.peers);
    }

    async fn on_peers_request(&self, origin: Origin) {
        if !self.role.is_coordinator() {
            return self.ignore("PEERS_REQUEST", "only the coordinator answers");
        }
        tracing::debug!("Resyncing {} ({})", origin.name, origin.address);

        let peers = self.directory.snapshot();
        self.send_to(
            origin.address,
            Message::PeersResponse(PeersPayload { peers }),
        )
        .await;
        self.send_to(origin.address, Message::History(self.history.entries()))
            .await;
    }

    fn on_goodbye(self: &Arc<Self>, payload: GoodbyePayload) {
        let id = payload.id;
        let removed = self.directory.remove(id);
        self.votes.clear_for(id);

        if let Some(peer) = removed {
            tracing::info!("{} ({}) left the group", peer.name, id);
            self.emit(NodeEvent::PeerLeft {
                id,
                name: Some(peer.name),
            });
        }

        if self.role.coordinator_id() == Some(id) && self.id() != Some(id) {
            tracing::warn!("Coordinator {} left, starting an election", id);
            self.role.clear_coordinator();
            self.trigger_election();
        }
    }

    fn on_history(&self, entries: Vec<HistoryEntry>) {
        let added = self.history.merge(entries);
        if added > 0 {
            tracing::info!("Merged {} history entries", added);
            self.emit(NodeEvent::HistorySynced { added });
        }
    }

    /// Replace the directory with a coordinator snapshot, minus evicted ids
    pub(super) fn apply_snapshot(&self, peers: Vec<Peer>) {
        let incoming: Vec<Peer> = peers
            .into_iter()
            .filter(|p| !self.bans.contains(p.id))
            .collect();

        let before = self.directory.snapshot();
        self.directory.replace(incoming);
        let after = self.directory.snapshot();

        let my_id = self.id();
        for peer in after.iter().filter(|p| Some(p.id) != my_id) {
            if !before.iter().any(|b| b.id == peer.id) {
                self.emit(NodeEvent::PeerJoined(peer.clone()));
            }
        }
        for peer in before.iter().filter(|p| Some(p.id) != my_id) {
            if !after.iter().any(|a| a.id == peer.id) {
                self.emit(NodeEvent::PeerLeft {
                    id: peer.id,
                    name: Some(peer.name.clone()),
                });
            }
        }
    }

    pub(super) async fn broadcast_peers_update(&self) {
        let peers = self.directory.snapshot();
        self.broadcast(Message::PeersUpdate(PeersPayload { peers }))
            .await;
    }
}
