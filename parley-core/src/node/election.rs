//! Bully election
//!
//! ```text
//!   candidate            higher ids
//!       |---- ELECTION ---->|
//!       |<------- OK -------|   (each higher id runs its own election)
//!       |                   |
//!   no OK within election_timeout -> promote and broadcast COORDINATOR
//! ```

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::events::NodeEvent;
use crate::membership::Peer;
use crate::message::{Message, PeersPayload};
use crate::role::Role;

use super::core::{Node, NodeShared};
use super::dispatch::Origin;

impl Node {
    /// Start an election now and wait for it to finish
    pub async fn start_election(&self) {
        self.shared.run_election().await;
    }
}

impl NodeShared {
    /// Run an election in the background unless one is already running
    pub(super) fn trigger_election(self: &Arc<Self>) {
        if self.election.in_progress() {
            return;
        }
        let shared = Arc::clone(self);
        self.spawn(async move { shared.run_election().await });
    }

    pub(super) async fn run_election(self: &Arc<Self>) {
        let Some(my_id) = self.id() else {
            tracing::debug!("Not joined yet, skipping election");
            return;
        };
        if !self.is_running() {
            return;
        }
        let Some(_guard) = self.election.try_begin() else {
            tracing::debug!("Election already in progress");
            return;
        };

        tracing::info!("{} ({}) starting election", self.name, my_id);
        self.emit(NodeEvent::ElectionStarted);

        if self.role.is_coordinator() {
            self.broadcast_peers_update().await;
        } else {
            self.role.set_role(Role::Candidate);
        }

        let higher = self.directory.higher_than(my_id);
        if higher.is_empty() {
            tracing::info!("No higher ids known, taking over");
            self.promote().await;
            return;
        }

        for peer in &higher {
            self.send_to(peer.address, Message::Election).await;
        }

        let timeout = self.config.timing.election_timeout;
        let answered = self.election.wait_for_ok(timeout).await;
        if !self.is_running() {
            return;
        }

        if answered {
            tracing::info!("A higher node answered, waiting for its announcement");
            self.role.stand_down();
            // Count from now so the winner has a full timeout to announce itself
            self.heartbeat.reset();
            return;
        }

        match self.role.role() {
            Role::Candidate | Role::Coordinator => {
                self.forget_silent(&higher);
                tracing::info!("No answer within {:?}, taking over", timeout);
                self.promote().await;
            }
            Role::Follower => {
                tracing::debug!("Coordinator announced during the election, standing by");
            }
        }
    }

    /// Higher ids that ignored our ELECTION are treated as gone
    fn forget_silent(&self, silent: &[Peer]) {
        for peer in silent {
            if self.directory.remove(peer.id).is_some() {
                tracing::info!("Dropping unresponsive {} ({})", peer.name, peer.id);
                self.emit(NodeEvent::PeerLeft {
                    id: peer.id,
                    name: Some(peer.name.clone()),
                });
            }
        }
    }

    /// Become coordinator and tell everyone
    pub(super) async fn promote(self: &Arc<Self>) {
        let Some(my_id) = self.id() else {
            return;
        };

        self.directory
            .insert(Peer::new(my_id, self.address, self.name.clone()));
        let previous = self.role.adopt(self.self_info(my_id), Some(my_id));
        self.heartbeat.reset();

        if previous != Role::Coordinator {
            tracing::info!("{} ({}) is now coordinator", self.name, my_id);
            self.emit(NodeEvent::CoordinatorChanged {
                id: my_id,
                name: self.name.clone(),
                is_self: true,
            });
            self.start_coordinator_loops();
        }

        self.announce_coordinator().await;
    }

    pub(super) async fn announce_coordinator(&self) {
        let peers = self.directory.snapshot();
        self.broadcast(Message::Coordinator(PeersPayload { peers }))
            .await;
    }

    /// Spawn the coordinator-only loops for a fresh term
    pub(super) fn start_coordinator_loops(self: &Arc<Self>) {
        let term = self.coordinator_term.fetch_add(1, Ordering::SeqCst) + 1;
        self.spawn_peers_sync(term);
        self.spawn_clock_sync(term);
    }

    /// True while we are coordinator and `term` is the current term
    pub(super) fn holds_term(&self, term: u64) -> bool {
        self.is_running()
            && self.coordinator_term.load(Ordering::SeqCst) == term
            && self.role.is_coordinator()
    }

    pub(super) async fn on_election(self: &Arc<Self>, origin: Origin) {
        let (Some(candidate), Some(my_id)) = (origin.id, self.id()) else {
            return self.ignore("ELECTION", "candidate or receiver has no id");
        };
        if my_id <= candidate {
            return self.ignore("ELECTION", "candidate outranks us");
        }

        tracing::info!("ELECTION from {} ({}), answering OK", origin.name, candidate);
        self.send_to(origin.address, Message::Ok).await;
        self.trigger_election();
    }

    pub(super) fn on_ok(&self, origin: Origin) {
        if !self.election.in_progress() {
            return self.ignore("OK", "no election in progress");
        }
        tracing::debug!("OK from {}", origin.name);
        self.election.record_ok();
    }
}
