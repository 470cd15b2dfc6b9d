//! User-facing hub facade.

use tokio::sync::{mpsc, oneshot};

use crate::hub::actor::Command;
use crate::hub::{Frame, HubError, Observer, ObserverId};

/// Request facade for the hub actor.
///
/// Every method waits for channel capacity, so a busy hub applies
/// backpressure to the caller instead of queueing without bound.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for HubHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubHandle").finish_non_exhaustive()
    }
}

impl HubHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    /// Add an observer to the live set.
    pub async fn register(&self, observer: Observer) -> Result<(), HubError> {
        self.send(Command::Register(observer)).await
    }

    /// Remove an observer. Removing an absent observer is a no-op.
    pub async fn unregister(&self, id: ObserverId) -> Result<(), HubError> {
        self.send(Command::Unregister(id)).await
    }

    /// Deliver a frame to every observer live when the actor processes it.
    pub async fn broadcast(&self, frame: impl Into<Frame>) -> Result<(), HubError> {
        self.send(Command::Broadcast(frame.into())).await
    }

    /// Number of observers currently in the live set.
    pub async fn observer_count(&self) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Count(reply)).await?;
        rx.await.map_err(|_| HubError::ReplyDropped)
    }

    /// Whether the hub actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, cmd: Command) -> Result<(), HubError> {
        self.tx.send(cmd).await.map_err(|_| HubError::ChannelSend)
    }
}
