//! Broadcast Hub
//!
//! Single-actor fan-out of outbound frames to every connected observer:
//! - **Actor**: one Tokio task owns the observer set and processes commands one at a time
//! - **Handle**: cloneable facade that submits register/unregister/broadcast commands
//!
//! # Components
//!
//! - [`HubHandle`]: Request facade used by the transport adapter and the probe controller
//! - [`Observer`] / [`FrameSink`]: One live connection and its write half
//! - [`Frame`]: One outbound text payload, shared across observers
//! - [`HubBuilder`] / [`Hub`]: Initialization and lifecycle management
//!
//! # Ordering
//!
//! Frames reach each observer in the order their broadcast commands were
//! accepted by the actor. No ordering is promised between observers.

mod actor;
mod builder;
mod error;
mod facade;
mod frame;
mod observer;

pub use builder::{Hub, HubBuilder};
pub use error::HubError;
pub use facade::HubHandle;
pub use frame::Frame;
pub use observer::{FrameSink, Observer, ObserverId};

#[cfg(test)]
pub(crate) mod testing {
    //! Observer sinks shared by hub and controller tests.

    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::{Frame, FrameSink, HubError, HubHandle};

    /// Sink that forwards every frame to a channel.
    pub struct RecordingSink {
        pub tx: mpsc::UnboundedSender<Frame>,
        pub closed: Arc<AtomicBool>,
    }

    impl RecordingSink {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<Frame>, Arc<AtomicBool>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let closed = Arc::new(AtomicBool::new(false));
            (
                Self {
                    tx,
                    closed: Arc::clone(&closed),
                },
                rx,
                closed,
            )
        }
    }

    #[async_trait::async_trait]
    impl FrameSink for RecordingSink {
        async fn send_frame(&mut self, frame: &Frame) -> Result<(), HubError> {
            self.tx
                .send(frame.clone())
                .map_err(|e| HubError::Delivery(e.to_string()))
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Sink whose connection is already gone.
    pub struct BrokenSink;

    #[async_trait::async_trait]
    impl FrameSink for BrokenSink {
        async fn send_frame(&mut self, _frame: &Frame) -> Result<(), HubError> {
            Err(HubError::Delivery("broken pipe".to_string()))
        }
    }

    /// Sink whose writes never complete.
    pub struct StalledSink;

    #[async_trait::async_trait]
    impl FrameSink for StalledSink {
        async fn send_frame(&mut self, _frame: &Frame) -> Result<(), HubError> {
            std::future::pending().await
        }
    }

    /// Poll the hub until it reports `expected` observers.
    pub async fn wait_for_observers(hub: &HubHandle, expected: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let count = hub.observer_count().await.unwrap();
            if count == expected {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {expected} observers, hub reports {count}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Receive the next frame or fail after one second.
    pub async fn next_frame(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Frame {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("sink channel closed")
    }
}
