//! Configuration module for LivePing.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (listen address)
//! - Probe settings (target, interval, stats period, timeouts)
//! - Hub settings (channel capacity, per-observer write timeout)

mod app;
mod validation;

pub use app::{AppConfig, HubConfig, ServerConfig};
pub use validation::{ConfigError, parse_duration};
pub(crate) use validation::require_non_zero;

// Re-export constants
pub use app::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_LISTEN_ADDR, DEFAULT_WRITE_TIMEOUT};
