//! Probe configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, require_non_zero};

/// Default echo interval (100 milliseconds).
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Default statistics period (1 second).
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Default time to wait for one echo reply (5 seconds).
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time to wait for a probe task to stop (5 seconds).
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default echo payload size in bytes.
pub const DEFAULT_PAYLOAD_SIZE: usize = 56;

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

fn default_stats_interval() -> Duration {
    DEFAULT_STATS_INTERVAL
}

fn default_reply_timeout() -> Duration {
    DEFAULT_REPLY_TIMEOUT
}

fn default_stop_timeout() -> Duration {
    DEFAULT_STOP_TIMEOUT
}

fn default_payload_size() -> usize {
    DEFAULT_PAYLOAD_SIZE
}

/// Configuration for the probe session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Target host (hostname or IP address).
    #[serde(default)]
    pub target: String,
    /// Echo interval (default: 100ms).
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
    /// Statistics snapshot period (default: 1s).
    #[serde(default = "default_stats_interval", with = "humantime_serde")]
    pub stats_interval: Duration,
    /// Time to wait for each echo reply (default: 5s).
    #[serde(default = "default_reply_timeout", with = "humantime_serde")]
    pub reply_timeout: Duration,
    /// Time to wait for the old probe to stop on restart (default: 5s).
    #[serde(default = "default_stop_timeout", with = "humantime_serde")]
    pub stop_timeout: Duration,
    /// Echo payload size in bytes (default: 56).
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl ProbeConfig {
    /// Create a new probe configuration for a target.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            interval: DEFAULT_INTERVAL,
            stats_interval: DEFAULT_STATS_INTERVAL,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            payload_size: DEFAULT_PAYLOAD_SIZE,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "probe target must not be empty".to_string(),
            ));
        }
        require_non_zero("probe interval", self.interval)?;
        require_non_zero("probe stats_interval", self.stats_interval)?;
        require_non_zero("probe reply_timeout", self.reply_timeout)?;
        require_non_zero("probe stop_timeout", self.stop_timeout)?;
        Ok(())
    }

    /// Set the echo interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the statistics period.
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Set the per-echo reply timeout.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Set the stop timeout.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Set the echo payload size.
    pub fn with_payload_size(mut self, size: usize) -> Self {
        self.payload_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_config_defaults() {
        let config = ProbeConfig::new("1.1.1.1");

        assert_eq!(config.target, "1.1.1.1");
        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert_eq!(config.stats_interval, Duration::from_secs(1));
        assert_eq!(config.reply_timeout, DEFAULT_REPLY_TIMEOUT);
        assert_eq!(config.payload_size, 56);
    }

    #[test]
    fn test_probe_config_builder() {
        let config = ProbeConfig::new("example.com")
            .with_interval(Duration::from_millis(250))
            .with_stats_interval(Duration::from_secs(2))
            .with_stop_timeout(Duration::from_secs(1));

        assert_eq!(config.interval, Duration::from_millis(250));
        assert_eq!(config.stats_interval, Duration::from_secs(2));
        assert_eq!(config.stop_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_probe_config_validation() {
        assert!(ProbeConfig::new("8.8.8.8").validate().is_ok());
        assert!(ProbeConfig::new("  ").validate().is_err());
        assert!(
            ProbeConfig::new("8.8.8.8")
                .with_interval(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
