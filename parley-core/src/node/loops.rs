//! Periodic activities: heartbeat emission, failure detection, directory
//! resync and Berkeley clock synchronization.

use std::sync::Arc;
use tokio::time::Instant;

use crate::berkeley::{compute_round, next_delay};
use crate::events::NodeEvent;
use crate::message::{Message, TimeAdjustPayload};

use super::core::NodeShared;

impl NodeShared {
    /// Broadcast HEARTBEAT every interval while coordinator
    pub(super) fn spawn_heartbeat_emitter(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let mut shutdown = self.shutdown_signal();
        let interval = self.config.timing.heartbeat_interval;

        self.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                }
                let Some(shared) = weak.upgrade() else { break };
                if !shared.is_running() {
                    break;
                }
                if shared.role.is_coordinator() {
                    shared.broadcast(Message::Heartbeat).await;
                }
            }
            tracing::debug!("Heartbeat emitter stopped");
        });
    }

    /// Start an election when the coordinator goes quiet
    pub(super) fn spawn_heartbeat_watchdog(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let mut shutdown = self.shutdown_signal();
        let poll = self.config.timing.heartbeat_poll_interval;
        let timeout = self.config.timing.heartbeat_timeout;

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

                let watching = shared.id().is_some()
                    && !shared.role.is_coordinator()
                    && shared.role.coordinator_id().is_some()
                    && !shared.election.in_progress();

                if watching && shared.heartbeat.expired(timeout) {
                    tracing::warn!(
                        "No heartbeat for {:?}, suspecting the coordinator",
                        shared.heartbeat.elapsed()
                    );
                    shared.heartbeat.reset();
                    shared.trigger_election();
                }
            }
            tracing::debug!("Heartbeat watchdog stopped");
        });
    }

    /// Push the authoritative directory every `peers_sync_interval`
    pub(super) fn spawn_peers_sync(self: &Arc<Self>, term: u64) {
        let weak = Arc::downgrade(self);
        let mut shutdown = self.shutdown_signal();
        let interval = self.config.timing.peers_sync_interval;

        self.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                let Some(shared) = weak.upgrade() else { break };
                if !shared.holds_term(term) {
                    break;
                }
                shared.broadcast_peers_update().await;
            }
            tracing::debug!("Peers sync loop for term {} stopped", term);
        });
    }

    /// Berkeley rounds every `interval ± jitter`
    pub(super) fn spawn_clock_sync(self: &Arc<Self>, term: u64) {
        let weak = Arc::downgrade(self);
        let mut shutdown = self.shutdown_signal();
        let interval = self.config.clock_sync.interval;
        let jitter = self.config.clock_sync.jitter;

        self.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(next_delay(interval, jitter)) => {}
                }
                let Some(shared) = weak.upgrade() else { break };
                if !shared.holds_term(term) {
                    break;
                }
                shared.run_clock_sync_round().await;
            }
            tracing::debug!("Clock sync loop for term {} stopped", term);
        });
    }

    /// One Berkeley round: poll, average, hand out corrections
    pub(super) async fn run_clock_sync_round(&self) {
        let Some(my_id) = self.id() else {
            return;
        };
        let followers = self.directory.others(my_id);
        if followers.is_empty() {
            tracing::debug!("No followers to synchronize");
            return;
        }

        self.berkeley.open();
        // Followers read their clocks as the request lands, so do we
        let own_time = self.time.now();
        for peer in &followers {
            self.send_to(peer.address, Message::TimeRequest).await;
        }

        let window = self.config.clock_sync.response_timeout;
        let poll = self.config.clock_sync.collect_poll_interval;
        let deadline = Instant::now() + window;
        while Instant::now() < deadline && self.berkeley.count() < followers.len() {
            tokio::time::sleep(poll).await;
        }

        let responses = self.berkeley.close();
        let Some(round) = compute_round(own_time, &responses) else {
            tracing::info!("Clock sync abandoned: no follower answered within {:?}", window);
            return;
        };

        for (id, correction) in &round.adjustments {
            if let Some(peer) = self.directory.get(*id) {
                self.send_to(
                    peer.address,
                    Message::TimeAdjust(TimeAdjustPayload {
                        correction: *correction,
                    }),
                )
                .await;
            }
        }

        let offset = self.time.adjust(round.own_delta);
        tracing::info!(
            "Clock sync round: {} of {} answered, own offset now {:+.3}s",
            responses.len(),
            followers.len(),
            offset
        );
        self.emit(NodeEvent::ClockAdjusted { offset });
    }
}
