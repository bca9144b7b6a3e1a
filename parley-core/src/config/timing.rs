//! Heartbeat, election, join and directory resync timing

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults::*;
use super::parse_duration_from_env;
use crate::error::{ParleyError, ParleyResult};

/// Timing configuration for failure detection and membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Interval between coordinator heartbeats
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,

    /// Silence after which a follower suspects the coordinator
    #[serde(with = "humantime_serde")]
    pub heartbeat_timeout: Duration,

    /// How often the watchdog checks the last heartbeat
    #[serde(with = "humantime_serde")]
    pub heartbeat_poll_interval: Duration,

    /// How long a candidate waits for an OK from a higher id
    #[serde(with = "humantime_serde")]
    pub election_timeout: Duration,

    /// How long a joining node waits for ASSIGN_ID
    #[serde(with = "humantime_serde")]
    pub join_timeout: Duration,

    /// Interval between authoritative PEERS_UPDATE broadcasts
    #[serde(with = "humantime_serde")]
    pub peers_sync_interval: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: duration_ms(DEFAULT_HEARTBEAT_INTERVAL_MS),
            heartbeat_timeout: duration_ms(DEFAULT_HEARTBEAT_TIMEOUT_MS),
            heartbeat_poll_interval: duration_ms(DEFAULT_HEARTBEAT_POLL_INTERVAL_MS),
            election_timeout: duration_ms(DEFAULT_ELECTION_TIMEOUT_MS),
            join_timeout: duration_ms(DEFAULT_JOIN_TIMEOUT_MS),
            peers_sync_interval: duration_secs(DEFAULT_PEERS_SYNC_INTERVAL_SECS),
        }
    }
}

impl TimingConfig {
    /// Load timing configuration from environment variables (milliseconds)
    pub fn from_env() -> ParleyResult<Self> {
        let mut config = Self::default();

        config.heartbeat_interval =
            parse_duration_from_env("PARLEY_HEARTBEAT_INTERVAL_MS", config.heartbeat_interval);
        config.heartbeat_timeout =
            parse_duration_from_env("PARLEY_HEARTBEAT_TIMEOUT_MS", config.heartbeat_timeout);
        config.heartbeat_poll_interval = parse_duration_from_env(
            "PARLEY_HEARTBEAT_POLL_INTERVAL_MS",
            config.heartbeat_poll_interval,
        );
        config.election_timeout =
            parse_duration_from_env("PARLEY_ELECTION_TIMEOUT_MS", config.election_timeout);
        config.join_timeout = parse_duration_from_env("PARLEY_JOIN_TIMEOUT_MS", config.join_timeout);
        config.peers_sync_interval =
            parse_duration_from_env("PARLEY_PEERS_SYNC_INTERVAL_MS", config.peers_sync_interval);

        Ok(config)
    }

    pub fn validate(&self) -> ParleyResult<()> {
        for (field, value) in [
            ("timing.heartbeat_interval", self.heartbeat_interval),
            ("timing.heartbeat_poll_interval", self.heartbeat_poll_interval),
            ("timing.election_timeout", self.election_timeout),
            ("timing.join_timeout", self.join_timeout),
            ("timing.peers_sync_interval", self.peers_sync_interval),
        ] {
            if value.is_zero() {
                return Err(ParleyError::configuration(field, "must be non-zero"));
            }
        }

        if self.heartbeat_timeout <= self.heartbeat_interval {
            return Err(ParleyError::configuration(
                "timing.heartbeat_timeout",
                format!(
                    "timeout {:?} must exceed the heartbeat interval {:?}",
                    self.heartbeat_timeout, self.heartbeat_interval
                ),
            ));
        }

        Ok(())
    }
}
