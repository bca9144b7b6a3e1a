//! Local commands: chat, listings, time and directory resync

use crate::error::{ParleyError, ParleyResult};
use crate::history::HistoryEntry;
use crate::membership::{Peer, PeerId};
use crate::message::{ChatPayload, Message};
use crate::time_correction::TimeStatus;

use super::core::{Node, NodeShared};

impl Node {
    /// Broadcast a chat line and record it in our own history
    pub async fn send_chat(&self, text: impl Into<String>) -> ParleyResult<HistoryEntry> {
        let shared = &self.shared;
        let my_id = shared.ensure_can_act()?;
        let text = text.into();

        let wall_time = shared.time.wall_time();
        let corrected_time = shared.time.now();
        let envelope = shared.envelope(Message::Chat(ChatPayload {
            text: text.clone(),
            wall_time,
            corrected_time,
        }));

        let entry = HistoryEntry {
            lamport: envelope.lamport,
            origin_id: my_id,
            origin_name: shared.name.clone(),
            text,
            wall_time,
            corrected_time,
        };
        shared.history.append(entry.clone());
        shared.broadcast_envelope(&envelope).await;

        Ok(entry)
    }

    /// Chat history in causal order
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.shared.history.entries()
    }

    /// Known peers ordered by id
    pub fn peers(&self) -> Vec<Peer> {
        self.shared.directory.snapshot()
    }

    pub fn time_status(&self) -> TimeStatus {
        self.shared.time.status()
    }

    /// Ask the coordinator for a fresh directory and full history
    pub async fn resync(&self) -> ParleyResult<()> {
        let shared = &self.shared;
        shared.ensure_can_act()?;

        if shared.role.is_coordinator() {
            tracing::debug!("Coordinator owns the directory, nothing to resync");
            return Ok(());
        }
        let coordinator = shared
            .role
            .coordinator()
            .ok_or_else(|| ParleyError::internal("no coordinator known"))?;

        shared
            .send_to(coordinator.address, Message::PeersRequest)
            .await;
        Ok(())
    }
}

impl NodeShared {
    /// Common preconditions of user commands: running, joined, not evicted
    pub(super) fn ensure_can_act(&self) -> ParleyResult<PeerId> {
        if !self.is_running() {
            return Err(ParleyError::NotRunning);
        }
        let id = self.id().ok_or(ParleyError::NotJoined)?;
        if self.bans.contains(id) {
            return Err(ParleyError::Banned { id });
        }
        Ok(id)
    }
}
