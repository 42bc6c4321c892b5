//! Engine timing and store configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Environment variable holding the store's auth token.
pub const AUTH_TOKEN_ENV: &str = "STRICTLY_SYNC_AUTH_TOKEN";

/// Configuration for a sync session.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Interval between remote polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,

    /// Interval between presence heartbeats, in milliseconds.
    #[serde(default = "default_heartbeat_interval_ms")]
    heartbeat_interval_ms: u64,

    /// Ping difference (seconds) above which the opponent is reported as
    /// possibly offline.
    #[serde(default = "default_offline_threshold_secs")]
    offline_threshold_secs: f64,

    /// Base URL of the store's cloud-function endpoint.
    #[serde(default)]
    store_url: Option<String>,
}

#[instrument]
fn default_poll_interval_ms() -> u64 {
    3000
}

#[instrument]
fn default_heartbeat_interval_ms() -> u64 {
    5000
}

#[instrument]
fn default_offline_threshold_secs() -> f64 {
    10.0
}

impl SyncConfig {
    /// Creates a configuration with default timings and no store URL.
    #[instrument]
    pub fn new() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            offline_threshold_secs: default_offline_threshold_secs(),
            store_url: None,
        }
    }

    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        info!(
            poll_interval_ms = config.poll_interval_ms,
            heartbeat_interval_ms = config.heartbeat_interval_ms,
            "Config loaded successfully"
        );
        Ok(config)
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Sets the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Sets the offline threshold.
    pub fn with_offline_threshold_secs(mut self, secs: f64) -> Self {
        self.offline_threshold_secs = secs;
        self
    }

    /// Sets the store URL.
    pub fn with_store_url(mut self, url: impl Into<String>) -> Self {
        self.store_url = Some(url.into());
        self
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Heartbeat interval as a duration.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Rejects settings the engine cannot run with.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::new("poll_interval_ms must be positive".to_string()));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::new(
                "heartbeat_interval_ms must be positive".to_string(),
            ));
        }
        if !self.offline_threshold_secs.is_finite() || self.offline_threshold_secs < 0.0 {
            return Err(ConfigError::new(format!(
                "offline_threshold_secs must be a non-negative number, got {}",
                self.offline_threshold_secs
            )));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::new();
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(*config.offline_threshold_secs(), 10.0);
        assert!(config.store_url().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SyncConfig = toml::from_str("poll_interval_ms = 750").unwrap();
        assert_eq!(*config.poll_interval_ms(), 750);
        assert_eq!(*config.heartbeat_interval_ms(), 5000);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = SyncConfig::new().with_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let config = SyncConfig::new().with_offline_threshold_secs(-1.0);
        assert!(config.validate().is_err());
    }
}
