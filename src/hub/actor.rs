//! Hub actor owning the observer set.
//!
//! Single-owner pattern: one task holds every observer, processes commands
//! via a bounded MPSC channel, and is the only place observers are written to.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::{Frame, HubError, Observer, ObserverId};

// =============================================================================
// Commands
// =============================================================================

/// Commands sent to the hub actor.
#[derive(Debug)]
pub enum Command {
    /// Add an observer to the live set.
    Register(Observer),
    /// Remove an observer; absent observers are ignored.
    Unregister(ObserverId),
    /// Deliver a frame to every live observer.
    Broadcast(Frame),
    /// Report the number of live observers.
    Count(oneshot::Sender<usize>),
}

// =============================================================================
// Actor
// =============================================================================

struct Entry {
    observer: Observer,
    failed: bool,
}

/// Broadcast actor.
///
/// A failed observer is never removed while the set is being iterated;
/// instead an `Unregister` command for it is queued behind the current one.
pub struct HubActor {
    observers: HashMap<ObserverId, Entry>,
    rx: mpsc::Receiver<Command>,
    self_tx: mpsc::WeakSender<Command>,
    write_timeout: Duration,
    cancel: CancellationToken,
}

impl HubActor {
    /// Spawn the actor task.
    ///
    /// Returns a tuple of:
    /// - `JoinHandle<()>`: Handle to the actor task
    /// - `mpsc::Sender<Command>`: Channel sender for commands
    pub fn spawn(
        channel_capacity: usize,
        write_timeout: Duration,
        cancel: CancellationToken,
    ) -> (JoinHandle<()>, mpsc::Sender<Command>) {
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));

        let actor = HubActor {
            observers: HashMap::new(),
            rx,
            self_tx: tx.downgrade(),
            write_timeout,
            cancel,
        };
        let handle = tokio::spawn(actor.run());

        (handle, tx)
    }

    async fn run(mut self) {
        tracing::info!("Hub started");

        loop {
            let cmd = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::info!("Hub shutting down");
                    break;
                }
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => {
                        tracing::warn!("Channel disconnected, shutting down");
                        break;
                    }
                },
            };

            self.handle_command(cmd).await;
        }

        self.close_all().await;
        tracing::info!("Hub stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Register(observer) => self.register(observer),
            Command::Unregister(id) => self.unregister(id).await,
            Command::Broadcast(frame) => self.broadcast(&frame).await,
            Command::Count(reply) => {
                // Requester may have gone away; nothing to do then
                let _ = reply.send(self.observers.len());
            }
        }
    }

    fn register(&mut self, observer: Observer) {
        let id = observer.id();
        self.observers.insert(
            id,
            Entry {
                observer,
                failed: false,
            },
        );
        tracing::info!(observer = %id, active = self.observers.len(), "Observer registered");
    }

    async fn unregister(&mut self, id: ObserverId) {
        match self.observers.remove(&id) {
            Some(mut entry) => {
                close_observer(self.write_timeout, &mut entry.observer).await;
                tracing::info!(observer = %id, active = self.observers.len(), "Observer unregistered");
            }
            None => {
                tracing::debug!(observer = %id, "Unregister for unknown observer ignored");
            }
        }
    }

    async fn broadcast(&mut self, frame: &Frame) {
        let write_timeout = self.write_timeout;
        let mut failed = Vec::new();

        for (id, entry) in self.observers.iter_mut() {
            if entry.failed {
                continue;
            }

            let result = match tokio::time::timeout(write_timeout, entry.observer.send(frame)).await
            {
                Ok(result) => result,
                Err(_) => Err(HubError::DeliveryTimeout),
            };

            if let Err(e) = result {
                tracing::warn!(observer = %id, error = %e, "Delivery failed, unregistering observer");
                entry.failed = true;
                failed.push(*id);
            }
        }

        for id in failed {
            self.schedule_unregister(id);
        }
    }

    fn schedule_unregister(&self, id: ObserverId) {
        let Some(tx) = self.self_tx.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            if tx.send(Command::Unregister(id)).await.is_err() {
                tracing::debug!(observer = %id, "Hub stopped before scheduled unregister");
            }
        });
    }

    async fn close_all(&mut self) {
        let count = self.observers.len();
        for (_, mut entry) in self.observers.drain() {
            close_observer(self.write_timeout, &mut entry.observer).await;
        }
        if count > 0 {
            tracing::info!(count, "Closed all observers");
        }
    }
}

// No `&HubActor` may be held across an await: sinks are `Send` but not `Sync`
async fn close_observer(write_timeout: Duration, observer: &mut Observer) {
    if tokio::time::timeout(write_timeout, observer.close())
        .await
        .is_err()
    {
        tracing::warn!(observer = %observer.id(), "Observer close timed out");
    }
}
