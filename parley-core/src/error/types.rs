//! Core error types for Parley

use std::net::SocketAddr;

use thiserror::Error;

use crate::membership::PeerId;

/// Error type shared by the coordination engine and its collaborators.
#[derive(Error, Debug)]
pub enum ParleyError {
    // Inbound
    #[error("Failed to decode envelope: {reason}")]
    Decode { reason: String },

    #[error("Unexpected {message_type} while {role}: {reason}")]
    ProtocolViolation {
        message_type: &'static str,
        role: String,
        reason: String,
    },

    // Outbound & transport
    #[error("Failed to send to {address}: {details}")]
    SendFailure { address: SocketAddr, details: String },

    #[error("Transport closed")]
    TransportClosed,

    #[error("IO error: {0}")]
    IoError(#[from] Box<std::io::Error>),

    // Serialization
    #[error("JSON error: {0}")]
    JsonError(#[from] Box<serde_json::Error>),

    // Configuration
    #[error("Configuration error in {component}: {message}")]
    ConfigurationError { component: String, message: String },

    // Local command rejections
    #[error("Node has no id yet; wait for the coordinator to assign one")]
    NotJoined,

    #[error("Node {id} was evicted and may not join or chat")]
    Banned { id: PeerId },

    #[error("Only the coordinator may {operation}")]
    NotCoordinator { operation: String },

    #[error("Unknown peer: {name}")]
    UnknownPeer { name: String },

    #[error("Cannot start a vote against yourself")]
    SelfTarget,

    #[error("A kick vote against {target_name} is already running")]
    VoteInProgress { target_name: String },

    #[error("No kick vote is active")]
    NoActiveVote,

    #[error("The kick vote against {target_name} is already closed")]
    VoteClosed { target_name: String },

    #[error("Node is not running")]
    NotRunning,

    // Internal
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ParleyError {
    /// True for rejections that are reported to the local user and have no
    /// network side effect.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ParleyError::NotJoined
                | ParleyError::Banned { .. }
                | ParleyError::NotCoordinator { .. }
                | ParleyError::UnknownPeer { .. }
                | ParleyError::SelfTarget
                | ParleyError::VoteInProgress { .. }
                | ParleyError::NoActiveVote
                | ParleyError::VoteClosed { .. }
                | ParleyError::NotRunning
        )
    }
}

pub type ParleyResult<T> = std::result::Result<T, ParleyError>;
