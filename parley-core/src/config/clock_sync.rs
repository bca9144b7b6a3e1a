//! Berkeley clock synchronization configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults::*;
use super::{parse_duration_from_env, parse_from_env};
use crate::error::{ParleyError, ParleyResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSyncConfig {
    /// Base period between sync rounds
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Random jitter applied in both directions around `interval`
    #[serde(with = "humantime_serde")]
    pub jitter: Duration,

    /// Window during which TIME_RESPONSE replies are collected
    #[serde(with = "humantime_serde")]
    pub response_timeout: Duration,

    /// Cadence at which the collection window checks for completion
    #[serde(with = "humantime_serde")]
    pub collect_poll_interval: Duration,

    /// Bound on the absolute clock offset, in seconds
    pub max_correction_secs: f64,
}

impl Default for ClockSyncConfig {
    fn default() -> Self {
        Self {
            interval: duration_secs(DEFAULT_CLOCK_SYNC_INTERVAL_SECS),
            jitter: duration_secs(DEFAULT_CLOCK_SYNC_JITTER_SECS),
            response_timeout: duration_ms(DEFAULT_CLOCK_SYNC_RESPONSE_TIMEOUT_MS),
            collect_poll_interval: duration_ms(DEFAULT_CLOCK_SYNC_COLLECT_POLL_MS),
            max_correction_secs: DEFAULT_MAX_CLOCK_CORRECTION_SECS,
        }
    }
}

impl ClockSyncConfig {
    pub fn from_env() -> ParleyResult<Self> {
        let mut config = Self::default();

        config.interval = parse_duration_from_env("PARLEY_CLOCK_SYNC_INTERVAL_MS", config.interval);
        config.jitter = parse_duration_from_env("PARLEY_CLOCK_SYNC_JITTER_MS", config.jitter);
        config.response_timeout = parse_duration_from_env(
            "PARLEY_CLOCK_SYNC_RESPONSE_TIMEOUT_MS",
            config.response_timeout,
        );

        if let Some(bound) = parse_from_env("PARLEY_MAX_CLOCK_CORRECTION_SECS")? {
            config.max_correction_secs = bound;
        }

        Ok(config)
    }

    pub fn validate(&self) -> ParleyResult<()> {
        if self.interval.is_zero() {
            return Err(ParleyError::configuration(
                "clock_sync.interval",
                "must be non-zero",
            ));
        }

        if self.jitter >= self.interval {
            return Err(ParleyError::configuration(
                "clock_sync.jitter",
                "jitter must be smaller than the sync interval",
            ));
        }

        if self.response_timeout.is_zero() || self.collect_poll_interval.is_zero() {
            return Err(ParleyError::configuration(
                "clock_sync.response_timeout",
                "collection window and poll interval must be non-zero",
            ));
        }

        if !self.max_correction_secs.is_finite() || self.max_correction_secs <= 0.0 {
            return Err(ParleyError::invalid_config(
                "clock_sync.max_correction_secs",
                self.max_correction_secs,
                "must be a positive number of seconds",
            ));
        }

        Ok(())
    }
}
