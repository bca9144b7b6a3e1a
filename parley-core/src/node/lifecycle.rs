use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::{ParleyError, ParleyResult};
use crate::events::NodeEvent;
use crate::membership::{Peer, PeerId};
use crate::message::{GoodbyePayload, JoinPayload, Message};
use crate::transport::Channel;

use super::core::{Node, NodeShared};

impl Node {
    /// Start the listeners and the failure detector.
    ///
    /// Called by [`Node::join`]; calling it again is a no-op.
    pub fn start(&self) -> ParleyResult<()> {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            if !self.shared.is_running() {
                return Err(ParleyError::NotRunning);
            }
            return Ok(());
        }

        self.shared.running.store(true, Ordering::SeqCst);
        tracing::info!("Node {} starting on {}", self.shared.name, self.shared.address);

        let shared = &self.shared;
        shared.spawn_listener(Channel::Broadcast);
        shared.spawn_listener(Channel::Unicast);
        shared.spawn_heartbeat_emitter();
        shared.spawn_heartbeat_watchdog();

        Ok(())
    }

    /// Join the group and return our id.
    ///
    /// Broadcasts JOIN and waits for the coordinator's ASSIGN_ID. With no
    /// answer before the join timeout this node assumes the group is empty,
    /// takes id 1 and becomes coordinator.
    pub async fn join(&self) -> ParleyResult<PeerId> {
        self.start()?;
        let shared = &self.shared;

        if let Some(id) = shared.id() {
            if shared.bans.contains(id) {
                return Err(ParleyError::Banned { id });
            }
            return Ok(id);
        }

        tracing::info!("{} sending JOIN", shared.name);
        shared
            .broadcast(Message::Join(JoinPayload {
                address: shared.address,
            }))
            .await;

        let timeout = shared.config.timing.join_timeout;
        let assigned = tokio::time::timeout(timeout, shared.wait_for_id()).await;

        match assigned {
            Ok(id) => Ok(id),
            Err(_) => {
                if let Some(id) = shared.id() {
                    return Ok(id);
                }
                if !shared.is_running() {
                    return Err(ParleyError::NotRunning);
                }
                tracing::warn!(
                    "No ASSIGN_ID within {:?}, assuming an empty group",
                    timeout
                );
                Ok(shared.bootstrap_as_first().await)
            }
        }
    }

    /// Announce departure, then stop
    pub async fn leave(&self) -> ParleyResult<()> {
        let shared = &self.shared;
        if !shared.is_running() {
            return Err(ParleyError::NotRunning);
        }

        if let Some(id) = shared.id() {
            tracing::info!("{} leaving the group", shared.name);
            shared
                .broadcast(Message::Goodbye(GoodbyePayload { id }))
                .await;
        }

        shared.shutdown().await;
        Ok(())
    }

    /// Stop every loop and close the transport without saying goodbye.
    ///
    /// To the rest of the group this looks like a crash.
    pub async fn shutdown(&self) {
        self.shared.shutdown().await;
    }
}

impl NodeShared {
    async fn wait_for_id(&self) -> PeerId {
        loop {
            let notified = self.assigned.notified();
            if let Some(id) = self.id() {
                return id;
            }
            notified.await;
        }
    }

    async fn bootstrap_as_first(self: &Arc<Self>) -> PeerId {
        let id = 1;
        self.set_id(id);
        self.directory
            .insert(Peer::new(id, self.address, self.name.clone()));
        self.emit(NodeEvent::Joined {
            id,
            coordinator: true,
        });
        self.promote().await;
        id
    }

    pub(super) async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Node {} shutting down", self.name);

        let _ = self.shutdown_tx.send(true);
        self.transport.close().await;
        self.assigned.notify_waiters();
    }
}
