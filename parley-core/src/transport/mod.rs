//! Datagram transport abstraction
//!
//! A node needs two channels: a group-wide broadcast channel and a
//! point-to-point unicast channel. Delivery is best effort on both.
//!
//! - `udp`: IPv4 multicast group plus a unicast UDP socket
//! - `memory`: in-process network used by tests

pub mod memory;
pub mod udp;

use async_trait::async_trait;
use std::net::SocketAddr;

use crate::error::ParleyResult;

pub use memory::{MemoryNetwork, MemoryTransport};
pub use udp::UdpTransport;

/// Which channel a datagram arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Broadcast,
    Unicast,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Broadcast => write!(f, "broadcast"),
            Channel::Unicast => write!(f, "unicast"),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// The unicast address peers use to reach this node
    fn local_addr(&self) -> SocketAddr;

    /// Send to every member of the group, possibly including ourselves
    async fn broadcast(&self, bytes: &[u8]) -> ParleyResult<()>;

    /// Send to a single peer
    async fn send_to(&self, addr: SocketAddr, bytes: &[u8]) -> ParleyResult<()>;

    /// Receive the next datagram on `channel`.
    ///
    /// Fails with `TransportClosed` once `close` has been called.
    async fn recv(&self, channel: Channel) -> ParleyResult<(Vec<u8>, SocketAddr)>;

    /// Stop delivering datagrams; pending and future `recv` calls fail
    async fn close(&self);
}
