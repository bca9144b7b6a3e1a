//! Multicast group and datagram socket configuration

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};

use super::defaults::*;
use super::parse_from_env;
use crate::error::{ParleyError, ParleyResult};

/// Network configuration for the broadcast channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Multicast group every participant joins
    pub multicast_group: Ipv4Addr,

    /// Port shared by the whole group
    pub multicast_port: u16,

    /// Local interface used to join the group and send to it
    pub interface: Ipv4Addr,

    /// Receive buffer size for a single datagram
    pub recv_buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            multicast_group: DEFAULT_MULTICAST_GROUP,
            multicast_port: DEFAULT_MULTICAST_PORT,
            interface: DEFAULT_MULTICAST_INTERFACE,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
        }
    }
}

impl NetworkConfig {
    /// Load network configuration from environment variables
    pub fn from_env() -> ParleyResult<Self> {
        let mut config = Self::default();

        if let Some(group) = parse_from_env("PARLEY_MULTICAST_GROUP")? {
            config.multicast_group = group;
        }

        if let Some(port) = parse_from_env("PARLEY_MULTICAST_PORT")? {
            config.multicast_port = port;
        }

        if let Some(interface) = parse_from_env("PARLEY_MULTICAST_INTERFACE")? {
            config.interface = interface;
        }

        if let Some(size) = parse_from_env("PARLEY_RECV_BUFFER_SIZE")? {
            config.recv_buffer_size = size;
        }

        Ok(config)
    }

    /// The group address datagrams are broadcast to
    pub fn group_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.multicast_group, self.multicast_port)
    }

    pub fn validate(&self) -> ParleyResult<()> {
        if !self.multicast_group.is_multicast() {
            return Err(ParleyError::invalid_config(
                "network.multicast_group",
                self.multicast_group,
                "not a multicast address",
            ));
        }

        if self.multicast_port == 0 {
            return Err(ParleyError::configuration(
                "network.multicast_port",
                "port must be non-zero",
            ));
        }

        if self.recv_buffer_size < 1024 {
            return Err(ParleyError::invalid_config(
                "network.recv_buffer_size",
                self.recv_buffer_size,
                "must be at least 1024 bytes",
            ));
        }

        Ok(())
    }
}
