//! Notifications published by a running node

use std::time::Duration;

use crate::history::HistoryEntry;
use crate::membership::{Peer, PeerId};

/// Observable things that happened to a node, for display or tests.
///
/// Delivered on a `tokio::sync::broadcast` channel; slow subscribers may
/// miss events.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// This node received its id, or assigned itself one
    Joined { id: PeerId, coordinator: bool },
    ChatReceived(HistoryEntry),
    PeerJoined(Peer),
    PeerLeft { id: PeerId, name: Option<String> },
    CoordinatorChanged { id: PeerId, name: String, is_self: bool },
    ElectionStarted,
    VoteStarted {
        target_id: PeerId,
        target_name: String,
        initiator_name: String,
        duration: Duration,
    },
    BallotCast { voter_name: String, vote: bool },
    VoteResolved {
        target_id: PeerId,
        target_name: String,
        evicted: bool,
        favor_count: usize,
        against_count: usize,
    },
    ClockAdjusted { offset: f64 },
    HistorySynced { added: usize },
    /// This node was voted out and has stopped
    Evicted,
}
