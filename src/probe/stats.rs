//! Periodic statistics snapshots for the active probe session.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::probe::StatsRecorder;
use crate::probe::controller::WeakController;
use crate::wire::PingStats;

/// Ticker bound to exactly one probe session generation.
///
/// A new aggregator is spawned for every session; the old one is stopped
/// under the controller lock before its replacement exists.
pub(crate) struct StatsAggregator {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StatsAggregator {
    /// Spawn the ticker. The first snapshot is taken one `period` from now.
    pub(crate) fn spawn(
        controller: WeakController,
        generation: u64,
        period: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let task = tokio::spawn(run_ticks(controller, generation, period, cancel.clone()));
        Self { cancel, task }
    }

    pub(crate) fn stop(self) {
        self.cancel.cancel();
        // A tick waiting on the controller lock is dropped here
        self.task.abort();
    }
}

async fn run_ticks(
    controller: WeakController,
    generation: u64,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(controller) = controller.upgrade() else {
            break;
        };
        controller.publish_stats(generation).await;
    }

    tracing::debug!(generation, "Stats aggregator stopped");
}

/// Snapshot the recorder into a wire record stamped with the current time.
pub(crate) fn snapshot(stats: &StatsRecorder) -> PingStats {
    PingStats::from_statistics(&stats.snapshot(), Utc::now())
}
