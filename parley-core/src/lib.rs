//! Parley core: the coordination engine of a peer-to-peer group chat
//!
//! Peers find each other over a multicast group, elect a coordinator with
//! the bully algorithm, keep a Lamport-ordered shared history, average their
//! clocks with Berkeley rounds and can vote a member out.

pub mod ban_list;
pub mod berkeley;
pub mod clock;
pub mod codec;
pub mod config;
pub mod election;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod history;
pub mod kick_vote;
pub mod lamport;
pub mod membership;
pub mod message;
pub mod node;
pub mod role;
pub mod time_correction;
pub mod transport;

pub use config::{ParleyConfig, ParleyConfigBuilder};
pub use error::{ParleyError, ParleyResult};
pub use events::NodeEvent;
pub use history::HistoryEntry;
pub use membership::{Peer, PeerId};
pub use node::{Node, NodeStatus};
pub use role::{CoordinatorInfo, Role};
