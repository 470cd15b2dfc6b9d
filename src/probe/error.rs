//! Probe-specific error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while starting or restarting a probe.
///
/// `Resolve` and `Creation` are both probe creation failures: the session
/// stays idle and a later restart retries from scratch.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Target host could not be resolved to an address.
    #[error("failed to resolve '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Probing facility could not be initialized for the target.
    #[error("failed to create probe for '{target}': {reason}")]
    Creation { target: String, reason: String },

    /// Probe configuration rejected before the facility was started.
    #[error("invalid probe configuration: {0}")]
    Config(#[from] ConfigError),

    /// Controller has been shut down.
    #[error("probe controller is shut down")]
    Shutdown,
}
