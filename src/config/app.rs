//! Application configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::probe::ProbeConfig;

use super::validation::{ConfigError, require_non_zero};

// =============================================================================
// Constants
// =============================================================================

/// Default listen address for the web server.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Default hub command channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Default per-observer write timeout (5 seconds).
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_write_timeout() -> Duration {
    DEFAULT_WRITE_TIMEOUT
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (default: "0.0.0.0:8080").
    ///
    /// A bare `:port` binds every interface.
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

impl ServerConfig {
    /// Listen address in `host:port` form, with `:port` expanded to `0.0.0.0:port`.
    pub fn bind_address(&self) -> String {
        let listen = self.listen.trim();
        if listen.starts_with(':') {
            format!("0.0.0.0{listen}")
        } else {
            listen.to_string()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let addr = self.bind_address();
        let invalid = || {
            ConfigError::ValidationError(format!("invalid listen address: '{}'", self.listen))
        };

        let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(invalid());
        }
        Ok(())
    }
}

// =============================================================================
// Hub Configuration
// =============================================================================

/// Broadcast hub configuration.
///
/// The command channel is bounded and producers block while it is full, so a
/// slow observer slows the probe loop down instead of growing a queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Command channel capacity (default: 64).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Maximum time a single observer write may take (default: 5s).
    #[serde(default = "default_write_timeout", with = "humantime_serde")]
    pub write_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Probe configuration.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Broadcast hub configuration.
    #[serde(default)]
    pub hub: HubConfig,

    /// Log every echo reply locally. Never affects what observers receive.
    #[serde(default)]
    pub verbose: bool,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// The file is only parsed here; call [`AppConfig::validate`] once
    /// command-line overrides have been applied.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.probe.validate()?;

        if self.hub.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "hub channel_capacity must be positive".to_string(),
            ));
        }
        require_non_zero("hub write_timeout", self.hub.write_timeout)?;

        Ok(())
    }
}
