//! Probe controller.
//!
//! Owns the single probe session, turns facility events into wire records
//! and serializes start/restart/stop against event handling and stats
//! ticks with one async lock.

use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::{Frame, HubHandle};
use crate::probe::stats::{self, StatsAggregator};
use crate::probe::{
    EchoReply, ProbeConfig, ProbeError, ProbeEvent, ProbeFacility, ProbeSession, ProbeStatistics,
    StatsRecorder,
};
use crate::wire::duration_to_ms;

/// Builder for [`ProbeController`].
pub struct ControllerBuilder {
    facility: Arc<dyn ProbeFacility>,
    hub: HubHandle,
    config: ProbeConfig,
    verbose: bool,
    cancel: CancellationToken,
}

impl ControllerBuilder {
    pub fn new(facility: Arc<dyn ProbeFacility>, hub: HubHandle, config: ProbeConfig) -> Self {
        Self {
            facility,
            hub,
            config,
            verbose: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Log every reply in ping(8) style.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Tie the controller's lifetime to a parent cancellation token.
    pub fn cancel_token(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Create an idle controller. Call [`ProbeController::start`] to begin probing.
    pub fn build(self) -> ProbeController {
        ProbeController {
            inner: Arc::new(Inner {
                facility: self.facility,
                hub: self.hub,
                config: self.config,
                verbose: self.verbose,
                cancel: self.cancel,
                state: Mutex::new(ControllerState::default()),
            }),
        }
    }
}

/// Cloneable handle to the probe controller.
#[derive(Clone)]
pub struct ProbeController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ProbeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeController")
            .field("target", &self.inner.config.target)
            .field("interval", &self.inner.config.interval)
            .finish_non_exhaustive()
    }
}

struct Inner {
    facility: Arc<dyn ProbeFacility>,
    hub: HubHandle,
    config: ProbeConfig,
    verbose: bool,
    cancel: CancellationToken,
    state: Mutex<ControllerState>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Default)]
struct ControllerState {
    active: Option<ActiveSession>,
    generation: u64,
}

impl ControllerState {
    /// The running session, if it belongs to `generation`.
    fn current(&mut self, generation: u64) -> Option<&mut ActiveSession> {
        self.active
            .as_mut()
            .filter(|a| a.session.generation() == generation && a.session.is_running())
    }
}

struct ActiveSession {
    session: ProbeSession,
    cancel: CancellationToken,
    stats: Arc<StatsRecorder>,
    probe_task: JoinHandle<()>,
    pump_task: JoinHandle<()>,
    aggregator: StatsAggregator,
}

/// Non-owning controller reference held by background tasks.
#[derive(Clone)]
pub(crate) struct WeakController(Weak<Inner>);

impl WeakController {
    pub(crate) fn upgrade(&self) -> Option<ProbeController> {
        self.0.upgrade().map(|inner| ProbeController { inner })
    }
}

impl ProbeController {
    /// Target every session of this controller probes.
    pub fn target(&self) -> &str {
        &self.inner.config.target
    }

    /// Start probing. A no-op when a session is already running.
    ///
    /// # Errors
    /// Returns a configuration error or the facility's creation error; the
    /// controller stays idle.
    pub async fn start(&self) -> Result<(), ProbeError> {
        let mut state = self.inner.state.lock().await;
        if let Some(active) = state.active.as_ref() {
            tracing::debug!(
                generation = active.session.generation(),
                "Probe session already running"
            );
            return Ok(());
        }
        self.start_locked(&mut state).await
    }

    /// Replace the current session with a fresh one for the same target.
    ///
    /// The old probe is stopped and its stats ticker torn down before the
    /// new probe exists; nothing from the old session is delivered after
    /// this returns. Without a running session this is a plain start.
    ///
    /// # Errors
    /// Returns the facility's creation error; the controller is then idle.
    pub async fn restart(&self) -> Result<(), ProbeError> {
        let mut state = self.inner.state.lock().await;
        if self.inner.cancel.is_cancelled() {
            return Err(ProbeError::Shutdown);
        }

        match state.active.as_ref() {
            Some(active) => tracing::info!(
                host = %active.session.target(),
                interval = ?active.session.interval(),
                generation = active.session.generation(),
                last_seq = active.session.last_seq(),
                "Restarting probe session"
            ),
            None => tracing::info!("Restart requested with no running session, starting fresh"),
        }

        self.stop_locked(&mut state).await;
        self.start_locked(&mut state).await
    }

    /// Stop the current session, if any.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        self.stop_locked(&mut state).await;
    }

    /// Stop the current session and refuse any further start.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.stop().await;
    }

    /// Copy of the current session state.
    pub async fn session(&self) -> Option<ProbeSession> {
        let state = self.inner.state.lock().await;
        state.active.as_ref().map(|a| a.session.clone())
    }

    pub(crate) fn downgrade(&self) -> WeakController {
        WeakController(Arc::downgrade(&self.inner))
    }

    async fn start_locked(&self, state: &mut ControllerState) -> Result<(), ProbeError> {
        if self.inner.cancel.is_cancelled() {
            return Err(ProbeError::Shutdown);
        }

        let config = &self.inner.config;
        if let Err(e) = config.validate() {
            tracing::error!(host = %config.target, error = %e, "Invalid probe configuration");
            return Err(e.into());
        }

        let cancel = self.inner.cancel.child_token();
        let run = match self
            .inner
            .facility
            .start(&config.target, config.interval, cancel.clone())
            .await
        {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(host = %config.target, error = %e, "Failed to create probe");
                return Err(e);
            }
        };

        state.generation += 1;
        let generation = state.generation;

        // Both tasks need the lock we hold, so neither acts before `active` is set
        let pump_task = tokio::spawn(pump_events(
            self.downgrade(),
            generation,
            run.events,
            cancel.clone(),
        ));
        let aggregator = StatsAggregator::spawn(
            self.downgrade(),
            generation,
            config.stats_interval,
            cancel.child_token(),
        );

        state.active = Some(ActiveSession {
            session: ProbeSession::new(config.target.clone(), config.interval, generation),
            cancel,
            stats: run.stats,
            probe_task: run.task,
            pump_task,
            aggregator,
        });

        tracing::info!(
            host = %config.target,
            interval = ?config.interval,
            generation,
            "Probe session started"
        );
        Ok(())
    }

    async fn stop_locked(&self, state: &mut ControllerState) {
        let Some(mut active) = state.active.take() else {
            return;
        };
        let generation = active.session.generation();
        active.session.stop();

        // probe first, then the ticker
        active.cancel.cancel();
        active.aggregator.stop();
        active.pump_task.abort();

        let stop_timeout = self.inner.config.stop_timeout;
        match tokio::time::timeout(stop_timeout, &mut active.probe_task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_cancelled() => {}
            Ok(Err(e)) => tracing::warn!(generation, error = %e, "Probe task ended abnormally"),
            Err(_) => {
                tracing::warn!(
                    generation,
                    timeout = ?stop_timeout,
                    "Probe did not stop in time, aborting"
                );
                active.probe_task.abort();
            }
        }

        log_finish(&active.stats.snapshot());
        active.session.mark_finished();
        tracing::info!(generation, "Probe session stopped");
    }

    /// Handle one event of session `generation`. Events of any other
    /// session are dropped.
    async fn dispatch(&self, generation: u64, event: ProbeEvent) {
        let mut state = self.inner.state.lock().await;
        let Some(active) = state.current(generation) else {
            tracing::debug!(generation, "Dropping event from replaced probe session");
            return;
        };

        match event {
            ProbeEvent::Reply(reply) => self.on_reply(&mut active.session, reply).await,
            ProbeEvent::Duplicate(reply) => {
                active.stats.record_duplicate();
                self.on_duplicate(&active.session, reply).await;
            }
            ProbeEvent::Finish(stats) => {
                log_finish(&stats);
                active.session.mark_finished();
            }
        }
    }

    async fn on_reply(&self, session: &mut ProbeSession, reply: EchoReply) {
        let outcome = session.observe_reply(reply.seq, reply.rtt);

        if let (Some(first), Some(last)) = (outcome.lost.first(), outcome.lost.last()) {
            tracing::warn!(
                lost = outcome.lost.len(),
                first = first.sequence,
                last = last.sequence,
                seq = reply.seq,
                "Packets lost"
            );
        }
        if self.inner.verbose {
            tracing::info!(
                "{} bytes from {}: icmp_seq={} time={:.3} ms",
                reply.bytes,
                reply.addr,
                reply.seq,
                duration_to_ms(reply.rtt)
            );
        }

        for notice in &outcome.lost {
            self.publish(notice.to_frame()).await;
        }
        match outcome.result.to_frame() {
            Ok(frame) => self.publish(frame).await,
            Err(e) => tracing::error!(seq = reply.seq, error = %e, "Failed to encode ping result"),
        }
    }

    async fn on_duplicate(&self, session: &ProbeSession, reply: EchoReply) {
        if self.inner.verbose {
            tracing::info!(
                "{} bytes from {}: icmp_seq={} time={:.3} ms (DUP!)",
                reply.bytes,
                reply.addr,
                reply.seq,
                duration_to_ms(reply.rtt)
            );
        }

        let result = session.observe_duplicate(reply.seq, reply.rtt);
        match result.to_frame() {
            Ok(frame) => self.publish(frame).await,
            Err(e) => tracing::error!(seq = reply.seq, error = %e, "Failed to encode duplicate"),
        }
    }

    /// Broadcast a stats snapshot of session `generation`, if still current.
    pub(crate) async fn publish_stats(&self, generation: u64) {
        let mut state = self.inner.state.lock().await;
        let Some(active) = state.current(generation) else {
            return;
        };

        match stats::snapshot(&active.stats).to_frame() {
            Ok(frame) => self.publish(frame).await,
            Err(e) => tracing::error!(error = %e, "Failed to encode stats snapshot"),
        }
    }

    async fn publish(&self, frame: Frame) {
        if let Err(e) = self.inner.hub.broadcast(frame).await {
            tracing::warn!(error = %e, "Failed to submit frame to hub");
        }
    }
}

async fn pump_events(
    controller: WeakController,
    generation: u64,
    mut events: mpsc::Receiver<ProbeEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        let Some(event) = event else {
            tracing::debug!(generation, "Probe event stream ended");
            break;
        };
        let Some(controller) = controller.upgrade() else {
            break;
        };
        controller.dispatch(generation, event).await;
    }
}

fn log_finish(stats: &ProbeStatistics) {
    tracing::info!(
        addr = %stats.addr,
        sent = stats.packets_sent,
        recv = stats.packets_recv,
        duplicates = stats.packets_recv_duplicates,
        loss_pct = stats.packet_loss,
        min_ms = duration_to_ms(stats.min_rtt),
        avg_ms = duration_to_ms(stats.avg_rtt),
        max_ms = duration_to_ms(stats.max_rtt),
        stddev_ms = duration_to_ms(stats.std_dev_rtt),
        "Ping statistics"
    );
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::hub::testing::{RecordingSink, next_frame};
    use crate::hub::{Hub, HubBuilder, Observer};
    use crate::probe::{NO_REPLY_SEQ, ProbeRun};
    use crate::wire::{LostPacketNotice, PingResult, PingStats, WireMessage};

    /// Facility whose runs are driven by hand through their event senders.
    #[derive(Default)]
    struct ScriptedFacility {
        fail: AtomicBool,
        runs: std::sync::Mutex<Vec<(mpsc::Sender<ProbeEvent>, Arc<StatsRecorder>)>>,
    }

    impl ScriptedFacility {
        fn run(&self, index: usize) -> (mpsc::Sender<ProbeEvent>, Arc<StatsRecorder>) {
            self.runs.lock().unwrap()[index].clone()
        }

        fn starts(&self) -> usize {
            self.runs.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl ProbeFacility for ScriptedFacility {
        async fn start(
            &self,
            target: &str,
            _interval: Duration,
            cancel: CancellationToken,
        ) -> Result<ProbeRun, ProbeError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProbeError::Creation {
                    target: target.to_string(),
                    reason: "scripted failure".to_string(),
                });
            }

            let (tx, rx) = mpsc::channel(64);
            let stats = Arc::new(StatsRecorder::new(target));
            self.runs.lock().unwrap().push((tx, Arc::clone(&stats)));
            let task = tokio::spawn(async move { cancel.cancelled().await });

            Ok(ProbeRun {
                events: rx,
                stats,
                task,
            })
        }
    }

    fn echo(seq: i64) -> EchoReply {
        EchoReply {
            seq,
            rtt: Duration::from_micros(1500),
            bytes: 64,
            addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
        }
    }

    fn quiet_config() -> ProbeConfig {
        ProbeConfig::new("10.0.0.1").with_stats_interval(Duration::from_secs(3600))
    }

    struct Fixture {
        hub: Hub,
        controller: ProbeController,
        facility: Arc<ScriptedFacility>,
        frames: UnboundedReceiver<Frame>,
    }

    async fn fixture(config: ProbeConfig) -> Fixture {
        let hub = HubBuilder::new().build();
        let (sink, frames, _closed) = RecordingSink::new();
        hub.handle().register(Observer::new(sink)).await.unwrap();

        let facility = Arc::new(ScriptedFacility::default());
        let controller = ControllerBuilder::new(facility.clone(), hub.handle(), config).build();

        Fixture {
            hub,
            controller,
            facility,
            frames,
        }
    }

    async fn next_message(frames: &mut UnboundedReceiver<Frame>) -> WireMessage {
        let frame = next_frame(frames).await;
        WireMessage::try_from(&frame).unwrap()
    }

    async fn next_result(frames: &mut UnboundedReceiver<Frame>) -> PingResult {
        match next_message(frames).await {
            WireMessage::Result(result) => result,
            other => panic!("expected ping result, got {other:?}"),
        }
    }

    async fn next_stats(frames: &mut UnboundedReceiver<Frame>) -> PingStats {
        loop {
            if let WireMessage::Stats(stats) = next_message(frames).await {
                return stats;
            }
        }
    }

    async fn assert_no_frame(frames: &mut UnboundedReceiver<Frame>) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(frames.try_recv().is_err(), "unexpected frame");
    }

    #[tokio::test]
    async fn test_contiguous_replies() {
        let mut f = fixture(quiet_config()).await;
        f.controller.start().await.unwrap();
        let (tx, _) = f.facility.run(0);

        for seq in 0..3 {
            tx.send(ProbeEvent::Reply(echo(seq))).await.unwrap();
            let result = next_result(&mut f.frames).await;
            assert_eq!(result.seq, seq);
            assert_eq!(result.lost_count, 0);
            assert_eq!(result.latency_ms, Some(1.5));
        }

        assert_no_frame(&mut f.frames).await;
        assert_eq!(f.controller.session().await.unwrap().last_seq(), 2);
    }

    #[tokio::test]
    async fn test_gap_emits_notices_before_result() {
        let mut f = fixture(quiet_config()).await;
        f.controller.start().await.unwrap();
        let (tx, _) = f.facility.run(0);

        for seq in [0, 1, 2, 5] {
            tx.send(ProbeEvent::Reply(echo(seq))).await.unwrap();
        }
        for seq in 0..3 {
            assert_eq!(next_result(&mut f.frames).await.seq, seq);
        }

        assert_eq!(
            next_message(&mut f.frames).await,
            WireMessage::LostPacket(LostPacketNotice::new(3))
        );
        assert_eq!(
            next_message(&mut f.frames).await,
            WireMessage::LostPacket(LostPacketNotice::new(4))
        );
        let result = next_result(&mut f.frames).await;
        assert_eq!(result.seq, 5);
        assert_eq!(result.lost_count, 2);
        assert_eq!(f.controller.session().await.unwrap().last_seq(), 5);
    }

    #[tokio::test]
    async fn test_duplicate_reply() {
        let mut f = fixture(quiet_config()).await;
        f.controller.start().await.unwrap();
        let (tx, _) = f.facility.run(0);

        for seq in 0..3 {
            tx.send(ProbeEvent::Reply(echo(seq))).await.unwrap();
            next_result(&mut f.frames).await;
        }
        tx.send(ProbeEvent::Duplicate(echo(2))).await.unwrap();

        let dup = next_result(&mut f.frames).await;
        assert_eq!(dup.seq, 2);
        assert_eq!(dup.error, "duplicate");
        assert_eq!(dup.lost_count, 0);
        assert_eq!(f.controller.session().await.unwrap().last_seq(), 2);

        let (_, recorder) = f.facility.run(0);
        assert_eq!(recorder.snapshot().packets_recv_duplicates, 1);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_start() {
        for config in [
            quiet_config().with_interval(Duration::ZERO),
            ProbeConfig::new("10.0.0.1").with_stats_interval(Duration::ZERO),
            ProbeConfig::new(""),
        ] {
            let mut f = fixture(config).await;

            let err = f.controller.start().await.unwrap_err();
            assert!(matches!(err, ProbeError::Config(_)), "got {err:?}");
            assert!(f.controller.restart().await.is_err());
            assert_eq!(f.facility.starts(), 0);
            assert!(f.controller.session().await.is_none());
            assert_no_frame(&mut f.frames).await;
        }
    }

    #[tokio::test]
    async fn test_restart_resets_sequence_tracking() {
        let mut f = fixture(quiet_config()).await;
        f.controller.start().await.unwrap();
        let (old_tx, _) = f.facility.run(0);

        old_tx.send(ProbeEvent::Reply(echo(10))).await.unwrap();
        for seq in 0..10 {
            assert_eq!(
                next_message(&mut f.frames).await,
                WireMessage::LostPacket(LostPacketNotice::new(seq))
            );
        }
        assert_eq!(next_result(&mut f.frames).await.lost_count, 10);

        f.controller.restart().await.unwrap();
        assert_eq!(f.facility.starts(), 2);
        let session = f.controller.session().await.unwrap();
        assert_eq!(session.last_seq(), NO_REPLY_SEQ);
        assert_eq!(session.generation(), 2);
        assert!(session.is_running());

        // Late event from the replaced probe goes nowhere
        let _ = old_tx.send(ProbeEvent::Reply(echo(11))).await;

        let (new_tx, _) = f.facility.run(1);
        new_tx.send(ProbeEvent::Reply(echo(0))).await.unwrap();
        let result = next_result(&mut f.frames).await;
        assert_eq!(result.seq, 0);
        assert_eq!(result.lost_count, 0);
        assert_no_frame(&mut f.frames).await;
    }

    #[tokio::test]
    async fn test_start_failure_leaves_controller_idle() {
        let mut f = fixture(quiet_config()).await;
        f.facility.fail.store(true, Ordering::SeqCst);

        let err = f.controller.start().await.unwrap_err();
        assert!(matches!(err, ProbeError::Creation { .. }));
        assert!(f.controller.session().await.is_none());
        assert_no_frame(&mut f.frames).await;

        f.facility.fail.store(false, Ordering::SeqCst);
        f.controller.restart().await.unwrap();
        let session = f.controller.session().await.unwrap();
        assert_eq!(session.last_seq(), NO_REPLY_SEQ);
        assert!(session.is_running());
    }

    #[tokio::test]
    async fn test_failed_restart_drops_old_session() {
        let mut f = fixture(quiet_config()).await;
        f.controller.start().await.unwrap();
        f.facility.fail.store(true, Ordering::SeqCst);

        assert!(f.controller.restart().await.is_err());
        assert!(f.controller.session().await.is_none());

        let (old_tx, _) = f.facility.run(0);
        let _ = old_tx.send(ProbeEvent::Reply(echo(0))).await;
        assert_no_frame(&mut f.frames).await;
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let f = fixture(quiet_config()).await;
        f.controller.start().await.unwrap();
        f.controller.start().await.unwrap();
        assert_eq!(f.facility.starts(), 1);
        assert_eq!(f.controller.session().await.unwrap().generation(), 1);
    }

    #[tokio::test]
    async fn test_stats_are_published_periodically() {
        let config = ProbeConfig::new("10.0.0.1").with_stats_interval(Duration::from_millis(30));
        let mut f = fixture(config).await;
        f.controller.start().await.unwrap();

        let (_, recorder) = f.facility.run(0);
        for _ in 0..5 {
            recorder.record_sent();
        }
        for _ in 0..4 {
            recorder.record_reply(Duration::from_millis(2));
        }

        let stats = loop {
            let stats = next_stats(&mut f.frames).await;
            if stats.packets_sent == 5 {
                break stats;
            }
        };
        assert_eq!(stats.packets_recv, 4);
        assert_eq!(stats.packet_loss, 20.0);
        assert_eq!(stats.avg_rtt, 2.0);
    }

    #[tokio::test]
    async fn test_restart_replaces_stats_source() {
        let config = ProbeConfig::new("10.0.0.1").with_stats_interval(Duration::from_millis(20));
        let mut f = fixture(config).await;
        f.controller.start().await.unwrap();
        let (_, old) = f.facility.run(0);
        for _ in 0..7 {
            old.record_sent();
        }

        f.controller.restart().await.unwrap();
        let (_, new) = f.facility.run(1);
        new.record_sent();
        new.record_sent();

        // Everything queued before the restart returned sits ahead of the marker
        f.hub.handle().broadcast("MARKER").await.unwrap();
        loop {
            if next_frame(&mut f.frames).await.as_str() == "MARKER" {
                break;
            }
        }

        for _ in 0..2 {
            assert_eq!(next_stats(&mut f.frames).await.packets_sent, 2);
        }
    }

    #[tokio::test]
    async fn test_finish_event_marks_session() {
        let mut f = fixture(quiet_config()).await;
        f.controller.start().await.unwrap();
        let (tx, _) = f.facility.run(0);

        tx.send(ProbeEvent::Finish(ProbeStatistics::default()))
            .await
            .unwrap();
        tx.send(ProbeEvent::Reply(echo(0))).await.unwrap();
        next_result(&mut f.frames).await;

        assert!(f.controller.session().await.unwrap().is_finished());
    }

    #[tokio::test]
    async fn test_stop_and_shutdown() {
        let mut f = fixture(quiet_config()).await;
        f.controller.start().await.unwrap();

        f.controller.stop().await;
        assert!(f.controller.session().await.is_none());
        let (tx, _) = f.facility.run(0);
        let _ = tx.send(ProbeEvent::Reply(echo(0))).await;
        assert_no_frame(&mut f.frames).await;

        f.controller.start().await.unwrap();
        assert_eq!(f.facility.starts(), 2);

        f.controller.shutdown().await;
        assert!(f.controller.session().await.is_none());
        assert!(matches!(
            f.controller.restart().await,
            Err(ProbeError::Shutdown)
        ));
        assert!(matches!(
            f.controller.start().await,
            Err(ProbeError::Shutdown)
        ));
    }

    #[tokio::test]
    async fn test_stuck_probe_is_aborted_after_stop_timeout() {
        struct StuckFacility;

        #[async_trait::async_trait]
        impl ProbeFacility for StuckFacility {
            async fn start(
                &self,
                target: &str,
                _interval: Duration,
                _cancel: CancellationToken,
            ) -> Result<ProbeRun, ProbeError> {
                let (_tx, rx) = mpsc::channel(1);
                Ok(ProbeRun {
                    events: rx,
                    stats: Arc::new(StatsRecorder::new(target)),
                    task: tokio::spawn(std::future::pending()),
                })
            }
        }

        let hub = HubBuilder::new().build();
        let config = quiet_config().with_stop_timeout(Duration::from_millis(50));
        let controller =
            ControllerBuilder::new(Arc::new(StuckFacility), hub.handle(), config).build();

        controller.start().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), controller.restart())
            .await
            .expect("restart must not wait past the stop timeout")
            .unwrap();
        assert_eq!(controller.session().await.unwrap().generation(), 2);
    }
}
