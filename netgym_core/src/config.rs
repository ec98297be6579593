//! Session configuration.
//!
//! Defaults match the stock agent process: `localhost:5555`, 100 ms step
//! interval. Values can come from code (`with_*`), a JSON file, or the
//! `NETGYM_HOST` / `NETGYM_PORT` environment variables.

use crate::error::ConfigError;
use netgym_env::Endpoint;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding [`SessionConfig::host`].
pub const ENV_HOST: &str = "NETGYM_HOST";

/// Environment variable overriding [`SessionConfig::port`].
pub const ENV_PORT: &str = "NETGYM_PORT";

/// Default peer port.
pub const DEFAULT_PORT: u16 = 5555;

/// Configuration for a bridge session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Logical name (for logging)
    pub name: String,

    /// Peer host (default: localhost)
    pub host: String,

    /// Peer port (default: 5555)
    pub port: u16,

    /// Simulated time between steps in milliseconds (default: 100).
    /// Read by the host's scheduler; the session itself has no clock.
    pub step_interval_ms: u64,

    /// Check each action against the declared action space (default: false)
    pub validate_actions: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "netgym".to_string(),
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            step_interval_ms: 100,
            validate_actions: false,
        }
    }
}

impl SessionConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_step_interval(mut self, interval: Duration) -> Self {
        self.step_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_action_validation(mut self, enabled: bool) -> Self {
        self.validate_actions = enabled;
        self
    }

    /// The endpoint the session connects to.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }

    /// Parses a JSON config; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Applies `NETGYM_HOST` / `NETGYM_PORT` from the process environment.
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup.
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_PORT,
                value: port.clone(),
            })?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.port, 5555);
        assert_eq!(config.step_interval(), Duration::from_millis(100));
        assert!(!config.validate_actions);
        assert_eq!(config.endpoint().to_string(), "tcp://localhost:5555");
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::default()
            .with_name("wifi-demo")
            .with_host("10.0.0.2")
            .with_port(6000)
            .with_step_interval(Duration::from_millis(250))
            .with_action_validation(true);

        assert_eq!(config.name, "wifi-demo");
        assert_eq!(config.endpoint(), Endpoint::new("10.0.0.2", 6000));
        assert_eq!(config.step_interval_ms, 250);
        assert!(config.validate_actions);
    }

    #[test]
    fn test_partial_json() {
        let config = SessionConfig::from_json_str(r#"{ "port": 7000 }"#).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.step_interval_ms, 100);
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            SessionConfig::from_json_str("{ port: }"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            SessionConfig::from_file("/nonexistent/netgym.json"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let config = SessionConfig::default()
            .apply_overrides(|key| match key {
                ENV_HOST => Some("sim-host".to_string()),
                ENV_PORT => Some("6001".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.host, "sim-host");
        assert_eq!(config.port, 6001);

        let err = SessionConfig::default()
            .apply_overrides(|key| (key == ENV_PORT).then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_PORT, .. }));
    }
}
