//! Observer handles and the sink trait implemented by transports.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::hub::{Frame, HubError};

/// Identity of one observer.
///
/// Identifiers are never reused within a process, so removal is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// Write half of one observer connection.
///
/// Implemented by the transport adapter. The hub is the only caller and
/// never calls two methods concurrently.
#[async_trait::async_trait]
pub trait FrameSink: Send + 'static {
    /// Deliver one frame to the connection.
    ///
    /// Any error marks the observer as failed and schedules its removal.
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), HubError>;

    /// Close the connection. Called once when the observer leaves the hub.
    async fn close(&mut self) {}
}

/// One live connection tracked by the hub.
pub struct Observer {
    id: ObserverId,
    sink: Box<dyn FrameSink>,
}

impl Observer {
    /// Wrap a sink into a new observer with a fresh identity.
    pub fn new(sink: impl FrameSink) -> Self {
        Self {
            id: ObserverId::next(),
            sink: Box::new(sink),
        }
    }

    /// Identity used to unregister this observer later.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub(crate) async fn send(&mut self, frame: &Frame) -> Result<(), HubError> {
        self.sink.send_frame(frame).await
    }

    pub(crate) async fn close(&mut self) {
        self.sink.close().await;
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::testing::BrokenSink;

    #[test]
    fn test_observer_ids_are_unique() {
        let a = Observer::new(BrokenSink);
        let b = Observer::new(BrokenSink);
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_observer_id_display() {
        let observer = Observer::new(BrokenSink);
        let text = observer.id().to_string();
        let n: u64 = text.strip_prefix("observer-").unwrap().parse().unwrap();
        assert!(n > 0);
    }
}
