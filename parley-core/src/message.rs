//! Protocol messages exchanged between nodes
//!
//! Every datagram carries one [`Envelope`]. The set of message kinds is
//! closed; the dispatcher matches on [`Message`] exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

use crate::history::HistoryEntry;
use crate::membership::{Peer, PeerId};

/// Wire discriminant of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Join,
    AssignId,
    Heartbeat,
    Election,
    Ok,
    Coordinator,
    Chat,
    TimeRequest,
    TimeResponse,
    TimeAdjust,
    KickVoteStart,
    KickVote,
    KickResult,
    PeersUpdate,
    PeersRequest,
    PeersResponse,
    Goodbye,
    History,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Join => "JOIN",
            MessageKind::AssignId => "ASSIGN_ID",
            MessageKind::Heartbeat => "HEARTBEAT",
            MessageKind::Election => "ELECTION",
            MessageKind::Ok => "OK",
            MessageKind::Coordinator => "COORDINATOR",
            MessageKind::Chat => "CHAT",
            MessageKind::TimeRequest => "TIME_REQUEST",
            MessageKind::TimeResponse => "TIME_RESPONSE",
            MessageKind::TimeAdjust => "TIME_ADJUST",
            MessageKind::KickVoteStart => "KICK_VOTE_START",
            MessageKind::KickVote => "KICK_VOTE",
            MessageKind::KickResult => "KICK_RESULT",
            MessageKind::PeersUpdate => "PEERS_UPDATE",
            MessageKind::PeersRequest => "PEERS_REQUEST",
            MessageKind::PeersResponse => "PEERS_RESPONSE",
            MessageKind::Goodbye => "GOODBYE",
            MessageKind::History => "HISTORY",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPayload {
    pub address: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignIdPayload {
    pub assigned_id: PeerId,
    pub coordinator_id: PeerId,
    pub coordinator_address: SocketAddr,
    pub coordinator_name: String,
    pub peers: Vec<Peer>,
    pub history: Vec<HistoryEntry>,
}

/// Directory snapshot carried by COORDINATOR, PEERS_UPDATE and PEERS_RESPONSE
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeersPayload {
    pub peers: Vec<Peer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub text: String,
    /// Sender's raw wall clock, seconds since the epoch
    #[serde(default)]
    pub wall_time: f64,
    /// Sender's corrected clock, seconds since the epoch
    #[serde(default)]
    pub corrected_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeResponsePayload {
    pub local_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAdjustPayload {
    pub correction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickVoteStartPayload {
    pub target_id: PeerId,
    pub target_name: String,
    pub initiator_id: PeerId,
    pub initiator_name: String,
    /// Vote duration in seconds
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickVotePayload {
    pub vote: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickResultPayload {
    pub target_id: PeerId,
    pub target_name: String,
    pub evicted: bool,
    pub favor_count: usize,
    pub against_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodbyePayload {
    pub id: PeerId,
}

/// Typed message body
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Join(JoinPayload),
    AssignId(AssignIdPayload),
    Heartbeat,
    Election,
    Ok,
    Coordinator(PeersPayload),
    Chat(ChatPayload),
    TimeRequest,
    TimeResponse(TimeResponsePayload),
    TimeAdjust(TimeAdjustPayload),
    KickVoteStart(KickVoteStartPayload),
    KickVote(KickVotePayload),
    KickResult(KickResultPayload),
    PeersUpdate(PeersPayload),
    PeersRequest,
    PeersResponse(PeersPayload),
    Goodbye(GoodbyePayload),
    History(Vec<HistoryEntry>),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Join(_) => MessageKind::Join,
            Message::AssignId(_) => MessageKind::AssignId,
            Message::Heartbeat => MessageKind::Heartbeat,
            Message::Election => MessageKind::Election,
            Message::Ok => MessageKind::Ok,
            Message::Coordinator(_) => MessageKind::Coordinator,
            Message::Chat(_) => MessageKind::Chat,
            Message::TimeRequest => MessageKind::TimeRequest,
            Message::TimeResponse(_) => MessageKind::TimeResponse,
            Message::TimeAdjust(_) => MessageKind::TimeAdjust,
            Message::KickVoteStart(_) => MessageKind::KickVoteStart,
            Message::KickVote(_) => MessageKind::KickVote,
            Message::KickResult(_) => MessageKind::KickResult,
            Message::PeersUpdate(_) => MessageKind::PeersUpdate,
            Message::PeersRequest => MessageKind::PeersRequest,
            Message::PeersResponse(_) => MessageKind::PeersResponse,
            Message::Goodbye(_) => MessageKind::Goodbye,
            Message::History(_) => MessageKind::History,
        }
    }
}

/// A message plus the sender's identity and Lamport timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// `None` until the sender has been assigned an id
    pub origin_id: Option<PeerId>,
    pub origin_address: SocketAddr,
    pub origin_name: String,
    pub lamport: u64,
    pub message: Message,
}

impl Envelope {
    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }
}
