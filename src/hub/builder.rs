//! Hub builder and runtime handle.
//!
//! Provides a builder pattern for constructing the hub actor and a
//! [`Hub`] struct that owns the actor task for graceful shutdown.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_WRITE_TIMEOUT, HubConfig};
use crate::hub::actor::HubActor;
use crate::hub::{HubError, HubHandle};

/// Builder for constructing the broadcast hub.
pub struct HubBuilder {
    channel_capacity: usize,
    write_timeout: Duration,
    cancel: CancellationToken,
}

impl Default for HubBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HubBuilder {
    /// Create a new hub builder with default settings.
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a builder from the `hub` configuration section.
    pub fn from_config(config: &HubConfig) -> Self {
        Self::new()
            .channel_capacity(config.channel_capacity)
            .write_timeout(config.write_timeout)
    }

    /// Set the command channel capacity.
    ///
    /// Producers block once this many commands are queued.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the per-observer write timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Tie the hub's lifetime to a parent cancellation token.
    pub fn cancel_token(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Spawn the hub actor. Must be called inside a Tokio runtime.
    pub fn build(self) -> Hub {
        let (actor_handle, tx) =
            HubActor::spawn(self.channel_capacity, self.write_timeout, self.cancel.clone());

        Hub {
            handle: HubHandle::new(tx),
            cancel: self.cancel,
            actor_handle: Some(actor_handle),
        }
    }
}

/// Running hub: request handle plus the actor task.
pub struct Hub {
    handle: HubHandle,
    cancel: CancellationToken,
    actor_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Hub {
    /// Cloneable request handle.
    pub fn handle(&self) -> HubHandle {
        self.handle.clone()
    }

    /// Stop the actor and close every observer.
    ///
    /// Commands still queued are not delivered.
    pub async fn shutdown(mut self) -> Result<(), HubError> {
        self.cancel.cancel();

        if let Some(handle) = self.actor_handle.take() {
            handle
                .await
                .map_err(|e| HubError::Internal(format!("failed to join hub actor: {e}")))?;
        }

        Ok(())
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        if self.actor_handle.is_some() {
            self.cancel.cancel();
        }
    }
}
