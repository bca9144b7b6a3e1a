//! Kick votes: starting, balloting, resolving and applying the result

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{ParleyError, ParleyResult};
use crate::events::NodeEvent;
use crate::kick_vote::{KickVote, MonitorStep, Resolution, VoteStatus};
use crate::message::{
    GoodbyePayload, KickResultPayload, KickVotePayload, KickVoteStartPayload, Message,
};

use super::core::{Node, NodeShared};
use super::dispatch::Origin;

const EVICTION_REASON: &str = "voted out by the group";

impl Node {
    /// Open a vote to evict the peer called `target_name`. Coordinator only.
    pub async fn start_kick_vote(&self, target_name: &str) -> ParleyResult<()> {
        let shared = &self.shared;
        let my_id = shared.ensure_can_act()?;

        if !shared.role.is_coordinator() {
            return Err(ParleyError::not_coordinator("start a kick vote"));
        }

        let target = shared
            .directory
            .find_by_name(target_name)
            .filter(|p| !shared.bans.contains(p.id))
            .ok_or_else(|| ParleyError::unknown_peer(target_name))?;
        if target.id == my_id {
            return Err(ParleyError::SelfTarget);
        }

        let duration = shared.config.vote.duration;
        let vote = KickVote::new(target.id, &target.name, my_id, &shared.name, duration);
        let generation = shared.votes.open(vote)?;
        shared.spawn_vote_monitor(generation);

        tracing::info!("Kick vote against {} ({}) started", target.name, target.id);
        shared.emit(NodeEvent::VoteStarted {
            target_id: target.id,
            target_name: target.name.clone(),
            initiator_name: shared.name.clone(),
            duration,
        });

        shared
            .broadcast(Message::KickVoteStart(KickVoteStartPayload {
                target_id: target.id,
                target_name: target.name,
                initiator_id: my_id,
                initiator_name: shared.name.clone(),
                duration: duration.as_secs_f64(),
            }))
            .await;
        Ok(())
    }

    /// Cast (or change) our ballot in the active vote
    pub async fn cast_vote(&self, vote: bool) -> ParleyResult<()> {
        let shared = &self.shared;
        let my_id = shared.ensure_can_act()?;

        shared.votes.record(my_id, vote)?;
        shared.emit(NodeEvent::BallotCast {
            voter_name: shared.name.clone(),
            vote,
        });
        shared
            .broadcast(Message::KickVote(KickVotePayload { vote }))
            .await;
        Ok(())
    }

    pub fn vote_status(&self) -> Option<VoteStatus> {
        self.shared.votes.status(Instant::now())
    }
}

impl NodeShared {
    pub(super) fn on_kick_vote_start(self: &Arc<Self>, origin: Origin, payload: KickVoteStartPayload) {
        if !self.directory.contains(payload.target_id) {
            tracing::info!(
                "Ignoring kick vote from {} against unknown {} ({})",
                origin.name,
                payload.target_name,
                payload.target_id
            );
            return;
        }
        if self.bans.contains(payload.target_id) {
            return self.ignore("KICK_VOTE_START", "target already evicted");
        }

        let duration = Duration::try_from_secs_f64(payload.duration)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(self.config.vote.duration);

        let vote = KickVote::new(
            payload.target_id,
            &payload.target_name,
            payload.initiator_id,
            &payload.initiator_name,
            duration,
        );

        match self.votes.open(vote) {
            Ok(generation) => {
                self.spawn_vote_monitor(generation);
                tracing::info!(
                    "{} opened a kick vote against {}",
                    payload.initiator_name,
                    payload.target_name
                );
                self.emit(NodeEvent::VoteStarted {
                    target_id: payload.target_id,
                    target_name: payload.target_name,
                    initiator_name: payload.initiator_name,
                    duration,
                });
            }
            Err(e) => tracing::debug!("Ignoring KICK_VOTE_START: {}", e),
        }
    }

    pub(super) fn on_kick_vote(&self, origin: Origin, payload: KickVotePayload) {
        let Some(voter) = origin.id else {
            return self.ignore("KICK_VOTE", "voter has no id");
        };
        if self.bans.contains(voter) {
            return self.ignore("KICK_VOTE", "voter was evicted");
        }

        match self.votes.record(voter, payload.vote) {
            Ok(()) => {
                tracing::info!(
                    "Ballot from {}: {}",
                    origin.name,
                    if payload.vote { "yes" } else { "no" }
                );
                self.emit(NodeEvent::BallotCast {
                    voter_name: origin.name,
                    vote: payload.vote,
                });
            }
            Err(e) => tracing::debug!("Ignoring KICK_VOTE from {}: {}", origin.name, e),
        }
    }

    pub(super) async fn on_kick_result(self: &Arc<Self>, origin: Origin, payload: KickResultPayload) {
        if origin.id.is_some_and(|id| self.bans.contains(id)) {
            return self.ignore("KICK_RESULT", "sender was evicted");
        }
        self.apply_kick_result(payload, false).await;
    }

    /// Watch one vote until it resolves, is replaced, or the node stops
    pub(super) fn spawn_vote_monitor(self: &Arc<Self>, generation: u64) {
        let weak = Arc::downgrade(self);
        let mut shutdown = self.shutdown_signal();
        let poll = self.config.vote.poll_interval;
        let threshold = self.config.vote.eviction_threshold();

        self.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(poll) => {}
                }
                let Some(shared) = weak.upgrade() else { break };
                if !shared.is_running() {
                    break;
                }

                let known_peers = shared.directory.len();
                match shared
                    .votes
                    .check(generation, known_peers, Instant::now(), threshold)
                {
                    MonitorStep::Pending => continue,
                    MonitorStep::Finished => break,
                    MonitorStep::Resolved(resolution) => {
                        shared.conclude_vote(resolution).await;
                        break;
                    }
                }
            }
        });
    }

    /// Apply a vote we resolved ourselves, then tell the group
    async fn conclude_vote(self: &Arc<Self>, resolution: Resolution) {
        tracing::info!(
            "Kick vote against {} resolved: {} ({} yes, {} no)",
            resolution.target_name,
            if resolution.evicted { "evicted" } else { "kept" },
            resolution.favor_count,
            resolution.against_count
        );

        let payload = KickResultPayload {
            target_id: resolution.target_id,
            target_name: resolution.target_name,
            evicted: resolution.evicted,
            favor_count: resolution.favor_count,
            against_count: resolution.against_count,
            reason: None,
        };

        self.apply_kick_result(payload.clone(), true).await;
        if self.is_running() {
            self.broadcast(Message::KickResult(payload)).await;
        }
    }

    /// Apply a KICK_RESULT. Evictions take effect once per target.
    pub(super) async fn apply_kick_result(self: &Arc<Self>, payload: KickResultPayload, local: bool) {
        let had_vote = self.votes.clear_for(payload.target_id);
        let my_id = self.id();

        if payload.evicted && Some(payload.target_id) == my_id {
            tracing::warn!("{} was voted out of the group, disconnecting", self.name);
            self.emit(NodeEvent::Evicted);
            self.shutdown().await;
            return;
        }

        if !payload.evicted {
            if local || had_vote {
                tracing::info!("{} stays in the group", payload.target_name);
                self.emit(NodeEvent::VoteResolved {
                    target_id: payload.target_id,
                    target_name: payload.target_name,
                    evicted: false,
                    favor_count: payload.favor_count,
                    against_count: payload.against_count,
                });
            }
            return;
        }

        if !self.bans.insert(payload.target_id) {
            tracing::debug!(
                "Eviction of {} already applied",
                payload.target_id
            );
            return;
        }

        tracing::info!(
            "{} ({}) evicted: {} yes, {} no",
            payload.target_name,
            payload.target_id,
            payload.favor_count,
            payload.against_count
        );
        self.emit(NodeEvent::VoteResolved {
            target_id: payload.target_id,
            target_name: payload.target_name.clone(),
            evicted: true,
            favor_count: payload.favor_count,
            against_count: payload.against_count,
        });

        let removed = self.directory.remove(payload.target_id);
        if let Some(peer) = &removed {
            self.emit(NodeEvent::PeerLeft {
                id: peer.id,
                name: Some(peer.name.clone()),
            });
        }

        if !self.role.is_coordinator() {
            return;
        }
        let Some(peer) = removed else {
            return;
        };

        // Tell the target directly, then drop it from everyone's directory
        self.send_to(
            peer.address,
            Message::KickResult(KickResultPayload {
                reason: Some(EVICTION_REASON.to_string()),
                ..payload
            }),
        )
        .await;
        self.broadcast(Message::Goodbye(GoodbyePayload { id: peer.id }))
            .await;
    }
}
