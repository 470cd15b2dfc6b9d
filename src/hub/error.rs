//! Hub-specific error types.

use thiserror::Error;

/// Errors that can occur in the broadcast hub.
#[derive(Debug, Error)]
pub enum HubError {
    /// Failed to send command to the hub actor (actor stopped).
    #[error("failed to send command to hub actor")]
    ChannelSend,

    /// The hub actor stopped before answering a query.
    #[error("hub actor dropped the reply")]
    ReplyDropped,

    /// Writing a frame to one observer failed.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Writing a frame to one observer took longer than the write timeout.
    #[error("delivery timed out")]
    DeliveryTimeout,

    /// Internal error (e.g., task join failure).
    #[error("internal error: {0}")]
    Internal(String),
}
