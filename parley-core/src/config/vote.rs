//! Kick vote configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults::*;
use super::{parse_duration_from_env, parse_from_env};
use crate::error::{ParleyError, ParleyResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteConfig {
    /// How long a vote stays open before the deadline rule applies
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Cadence of the per-vote resolution monitor
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Eviction needs at least `min_favorable_votes + 1` YES ballots
    pub min_favorable_votes: usize,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            duration: duration_secs(DEFAULT_VOTE_DURATION_SECS),
            poll_interval: duration_ms(DEFAULT_VOTE_POLL_INTERVAL_MS),
            min_favorable_votes: DEFAULT_MIN_FAVORABLE_VOTES,
        }
    }
}

impl VoteConfig {
    pub fn from_env() -> ParleyResult<Self> {
        let mut config = Self::default();

        config.duration = parse_duration_from_env("PARLEY_VOTE_DURATION_MS", config.duration);
        config.poll_interval =
            parse_duration_from_env("PARLEY_VOTE_POLL_INTERVAL_MS", config.poll_interval);

        if let Some(min) = parse_from_env("PARLEY_MIN_FAVORABLE_VOTES")? {
            config.min_favorable_votes = min;
        }

        Ok(config)
    }

    /// Number of YES ballots that evicts the target
    pub fn eviction_threshold(&self) -> usize {
        self.min_favorable_votes + 1
    }

    pub fn validate(&self) -> ParleyResult<()> {
        if self.duration.is_zero() || self.poll_interval.is_zero() {
            return Err(ParleyError::configuration(
                "vote.duration",
                "vote duration and poll interval must be non-zero",
            ));
        }

        if self.poll_interval > self.duration {
            return Err(ParleyError::configuration(
                "vote.poll_interval",
                "poll interval must not exceed the vote duration",
            ));
        }

        Ok(())
    }
}
