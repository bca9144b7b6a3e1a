//! Default configuration values for Parley
//!
//! This module centralizes all default values to make them easy to find and modify.

use std::net::Ipv4Addr;
use std::time::Duration;

// Node defaults
pub const DEFAULT_BIND_HOST: Ipv4Addr = Ipv4Addr::LOCALHOST;
pub const DEFAULT_BIND_PORT: u16 = 6000;

// Network defaults
pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 1, 1, 1);
pub const DEFAULT_MULTICAST_PORT: u16 = 5007;
pub const DEFAULT_MULTICAST_INTERFACE: Ipv4Addr = Ipv4Addr::LOCALHOST;
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 64 * 1024; // 64KB, one datagram

// Heartbeat & election defaults
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_HEARTBEAT_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_HEARTBEAT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_ELECTION_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_PEERS_SYNC_INTERVAL_SECS: u64 = 15;

// Berkeley clock sync defaults
pub const DEFAULT_CLOCK_SYNC_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_CLOCK_SYNC_JITTER_SECS: u64 = 5;
pub const DEFAULT_CLOCK_SYNC_RESPONSE_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_CLOCK_SYNC_COLLECT_POLL_MS: u64 = 200;
pub const DEFAULT_MAX_CLOCK_CORRECTION_SECS: f64 = 10.0;

// Kick vote defaults
pub const DEFAULT_VOTE_DURATION_SECS: u64 = 30;
pub const DEFAULT_VOTE_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MIN_FAVORABLE_VOTES: usize = 1;

// Event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

// Helper functions for Duration creation
pub const fn duration_ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub const fn duration_secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}
