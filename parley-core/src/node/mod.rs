//! Node module - one participant of a Parley group
//!
//! The node is split into logical components:
//! - `core`: the `Node` handle, shared state and send helpers
//! - `lifecycle`: start, join, leave and shutdown
//! - `dispatch`: inbound routing and the membership, heartbeat, chat and
//!   clock handlers
//! - `election`: bully election and coordinator promotion
//! - `loops`: heartbeat emitter, watchdog, directory resync and Berkeley rounds
//! - `voting`: kick votes
//! - `commands`: chat and read-only queries

mod commands;
mod core;
mod dispatch;
mod election;
mod lifecycle;
mod loops;
mod voting;

pub use self::core::{Node, NodeStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParleyConfigBuilder;
    use crate::error::ParleyError;
    use crate::role::Role;
    use crate::transport::MemoryNetwork;
    use std::sync::Arc;

    fn lone_node(name: &str) -> Node {
        let net = MemoryNetwork::new();
        let config = ParleyConfigBuilder::from_config(crate::config::ParleyConfig::test())
            .name(name)
            .build()
            .unwrap();
        Node::new(config, Arc::new(net.endpoint()))
    }

    #[tokio::test]
    async fn test_commands_before_join_are_rejected() {
        let node = lone_node("early");
        assert!(matches!(
            node.send_chat("hi").await,
            Err(ParleyError::NotRunning)
        ));

        node.start().unwrap();
        assert!(matches!(
            node.send_chat("hi").await,
            Err(ParleyError::NotJoined)
        ));
        assert!(matches!(node.cast_vote(true).await, Err(ParleyError::NotJoined)));
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_lone_node_becomes_coordinator() {
        let node = lone_node("solo");
        let id = node.join().await.unwrap();

        assert_eq!(id, 1);
        assert_eq!(node.role(), Role::Coordinator);
        assert_eq!(node.coordinator().map(|c| c.id), Some(1));
        assert_eq!(node.peers().len(), 1);
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_chat_is_recorded_locally() {
        let node = lone_node("solo");
        node.join().await.unwrap();

        let entry = node.send_chat("hello").await.unwrap();
        assert_eq!(entry.origin_id, 1);
        assert_eq!(node.history(), vec![entry]);
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_kick_vote_preconditions() {
        let node = lone_node("solo");
        node.join().await.unwrap();

        assert!(matches!(
            node.start_kick_vote("nobody").await,
            Err(ParleyError::UnknownPeer { .. })
        ));
        assert!(matches!(
            node.start_kick_vote("SOLO").await,
            Err(ParleyError::SelfTarget)
        ));
        assert!(matches!(node.cast_vote(false).await, Err(ParleyError::NoActiveVote)));
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_stopped_node_rejects_commands() {
        let node = lone_node("solo");
        node.join().await.unwrap();
        node.leave().await.unwrap();

        assert!(!node.is_running());
        assert!(matches!(node.leave().await, Err(ParleyError::NotRunning)));
        assert!(matches!(node.join().await, Err(ParleyError::NotRunning)));
        assert!(matches!(node.resync().await, Err(ParleyError::NotRunning)));
    }
}
