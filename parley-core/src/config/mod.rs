//! Configuration for a Parley node
//!
//! Every timing constant the protocols rely on is configurable. Values come
//! from defaults, a TOML file, or `PARLEY_*` environment variables, and are
//! validated before a node starts.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ParleyError, ParleyResult};

pub mod clock_sync;
pub mod defaults;
pub mod network;
pub mod timing;
pub mod vote;

pub use clock_sync::ClockSyncConfig;
pub use defaults::*;
pub use network::NetworkConfig;
pub use timing::TimingConfig;
pub use vote::VoteConfig;

/// Root configuration structure for a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    /// Identity and unicast endpoint of this node
    pub node: NodeSettings,

    /// Multicast group configuration
    pub network: NetworkConfig,

    /// Heartbeat, election, join and resync timing
    pub timing: TimingConfig,

    /// Berkeley clock synchronization
    pub clock_sync: ClockSyncConfig,

    /// Kick vote policy
    pub vote: VoteConfig,
}

/// Identity and unicast endpoint of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Display name; defaults to `node:<port>`
    pub name: Option<String>,

    /// Host the unicast socket binds to
    pub bind_host: Ipv4Addr,

    /// Port the unicast socket binds to
    pub bind_port: u16,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: None,
            bind_host: DEFAULT_BIND_HOST,
            bind_port: DEFAULT_BIND_PORT,
        }
    }
}

impl NodeSettings {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.bind_host, self.bind_port))
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("node:{}", self.bind_port))
    }
}

impl ParleyConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> ParleyResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ParleyError::configuration(
                "config_file",
                format!("Failed to read {}: {}", path.display(), e),
            )
        })?;

        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> ParleyResult<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("PARLEY_NODE_NAME") {
            config.node.name = Some(name);
        }

        if let Some(host) = parse_from_env("PARLEY_BIND_HOST")? {
            config.node.bind_host = host;
        }

        if let Some(port) = parse_from_env("PARLEY_BIND_PORT")? {
            config.node.bind_port = port;
        }

        config.network = NetworkConfig::from_env()?;
        config.timing = TimingConfig::from_env()?;
        config.clock_sync = ClockSyncConfig::from_env()?;
        config.vote = VoteConfig::from_env()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ParleyResult<()> {
        if let Some(name) = &self.node.name {
            if name.trim().is_empty() {
                return Err(ParleyError::configuration(
                    "node.name",
                    "name must not be blank",
                ));
            }
        }

        self.network.validate()?;
        self.timing.validate()?;
        self.clock_sync.validate()?;
        self.vote.validate()?;

        Ok(())
    }

    /// Create a configuration with short timeouts for in-process clusters
    pub fn test() -> Self {
        let mut config = Self::default();
        config.node.bind_port = 0;
        config.timing = TimingConfig {
            heartbeat_interval: Duration::from_millis(50),
            heartbeat_timeout: Duration::from_millis(300),
            heartbeat_poll_interval: Duration::from_millis(25),
            election_timeout: Duration::from_millis(150),
            join_timeout: Duration::from_millis(250),
            peers_sync_interval: Duration::from_millis(100),
        };
        config.clock_sync = ClockSyncConfig {
            interval: Duration::from_millis(200),
            jitter: Duration::from_millis(20),
            response_timeout: Duration::from_millis(100),
            collect_poll_interval: Duration::from_millis(10),
            max_correction_secs: DEFAULT_MAX_CLOCK_CORRECTION_SECS,
        };
        config.vote = VoteConfig {
            duration: Duration::from_millis(1500),
            poll_interval: Duration::from_millis(20),
            min_favorable_votes: DEFAULT_MIN_FAVORABLE_VOTES,
        };
        config
    }
}

/// Builder for ParleyConfig
pub struct ParleyConfigBuilder {
    config: ParleyConfig,
}

impl ParleyConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ParleyConfig::default(),
        }
    }

    pub fn from_config(config: ParleyConfig) -> Self {
        Self { config }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.node.name = Some(name.into());
        self
    }

    pub fn bind_host(mut self, host: Ipv4Addr) -> Self {
        self.config.node.bind_host = host;
        self
    }

    pub fn bind_port(mut self, port: u16) -> Self {
        self.config.node.bind_port = port;
        self
    }

    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.config.network = network;
        self
    }

    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.config.timing = timing;
        self
    }

    pub fn clock_sync(mut self, clock_sync: ClockSyncConfig) -> Self {
        self.config.clock_sync = clock_sync;
        self
    }

    pub fn vote(mut self, vote: VoteConfig) -> Self {
        self.config.vote = vote;
        self
    }

    pub fn build(self) -> ParleyResult<ParleyConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ParleyConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper functions for environment parsing
pub(crate) fn parse_duration_from_env(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

pub(crate) fn parse_from_env<T: FromStr>(key: &str) -> ParleyResult<Option<T>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ParleyError::invalid_config(key, value, "could not be parsed")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config_validation() {
        assert!(ParleyConfig::default().validate().is_ok());
        assert!(ParleyConfig::test().validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ParleyConfigBuilder::new()
            .name("alice")
            .bind_port(6001)
            .build()
            .unwrap();

        assert_eq!(config.node.display_name(), "alice");
        assert_eq!(config.node.bind_addr(), "127.0.0.1:6001".parse().unwrap());
    }

    #[test]
    fn test_default_name_uses_port() {
        let settings = NodeSettings {
            bind_port: 6123,
            ..Default::default()
        };
        assert_eq!(settings.display_name(), "node:6123");
    }

    #[test]
    fn test_heartbeat_timeout_must_exceed_interval() {
        let mut config = ParleyConfig::default();
        config.timing.heartbeat_timeout = config.timing.heartbeat_interval;
        assert!(matches!(
            config.validate(),
            Err(ParleyError::ConfigurationError { component, .. }) if component == "timing.heartbeat_timeout"
        ));
    }

    #[test]
    fn test_non_multicast_group_rejected() {
        let mut config = ParleyConfig::default();
        config.network.multicast_group = Ipv4Addr::new(10, 0, 0, 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_bound_must_be_positive() {
        let mut config = ParleyConfig::default();
        config.clock_sync.max_correction_secs = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_with_humantime_durations() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[node]
name = "bob"
bind_port = 7002

[timing]
heartbeat_interval = "500ms"
heartbeat_timeout = "2s"

[vote]
min_favorable_votes = 2
"#
        )
        .unwrap();

        let config = ParleyConfig::from_file(file.path()).unwrap();
        assert_eq!(config.node.display_name(), "bob");
        assert_eq!(config.node.bind_port, 7002);
        assert_eq!(config.timing.heartbeat_interval, Duration::from_millis(500));
        assert_eq!(config.timing.heartbeat_timeout, Duration::from_secs(2));
        assert_eq!(config.vote.eviction_threshold(), 3);
        assert_eq!(config.clock_sync, ClockSyncConfig::default());
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timing]\nheartbeat_interval = \"5s\"\nheartbeat_timeout = \"1s\"").unwrap();
        assert!(ParleyConfig::from_file(file.path()).is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("PARLEY_NODE_NAME", "carol");
        std::env::set_var("PARLEY_BIND_PORT", "7100");
        std::env::set_var("PARLEY_ELECTION_TIMEOUT_MS", "1234");
        std::env::set_var("PARLEY_MIN_FAVORABLE_VOTES", "3");

        let config = ParleyConfig::from_env();

        std::env::remove_var("PARLEY_NODE_NAME");
        std::env::remove_var("PARLEY_BIND_PORT");
        std::env::remove_var("PARLEY_ELECTION_TIMEOUT_MS");
        std::env::remove_var("PARLEY_MIN_FAVORABLE_VOTES");

        let config = config.unwrap();
        assert_eq!(config.node.display_name(), "carol");
        assert_eq!(config.node.bind_port, 7100);
        assert_eq!(config.timing.election_timeout, Duration::from_millis(1234));
        assert_eq!(config.vote.min_favorable_votes, 3);
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_garbage() {
        std::env::set_var("PARLEY_BIND_PORT", "not-a-port");
        let result = ParleyConfig::from_env();
        std::env::remove_var("PARLEY_BIND_PORT");

        assert!(matches!(result, Err(ParleyError::ConfigurationError { .. })));
    }
}
