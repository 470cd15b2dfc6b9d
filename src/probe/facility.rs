//! Probing facility contract and shared statistics.

use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::probe::ProbeError;

/// One echo reply as observed by the facility.
#[derive(Debug, Clone, PartialEq)]
pub struct EchoReply {
    /// Logical sequence number, starting at 0 for each run.
    pub seq: i64,
    /// Round-trip time.
    pub rtt: Duration,
    /// Reply size in bytes, ICMP header included.
    pub bytes: usize,
    /// Address the reply came from.
    pub addr: IpAddr,
}

/// Events produced by a running probe.
#[derive(Debug, Clone)]
pub enum ProbeEvent {
    /// First reply for a sequence number.
    Reply(EchoReply),
    /// Repeated reply for an already answered sequence number.
    Duplicate(EchoReply),
    /// The run ended on its own; carries the final statistics.
    Finish(ProbeStatistics),
}

/// Cumulative statistics of one probe run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeStatistics {
    /// Resolved target address.
    pub addr: String,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub packets_recv_duplicates: u64,
    /// Packet loss in percent.
    pub packet_loss: f64,
    pub min_rtt: Duration,
    pub max_rtt: Duration,
    pub avg_rtt: Duration,
    /// Population standard deviation of the RTT.
    pub std_dev_rtt: Duration,
}

#[derive(Debug, Default)]
struct Counters {
    sent: u64,
    recv: u64,
    duplicates: u64,
    min_rtt: Option<Duration>,
    max_rtt: Duration,
    // Welford running mean / sum of squares, in nanoseconds
    mean_ns: f64,
    m2_ns: f64,
}

/// Thread-safe cumulative counters for one probe run.
///
/// The facility records requests and first-seen replies, the controller
/// records duplicates it is handed, and the stats aggregator reads snapshots.
#[derive(Debug)]
pub struct StatsRecorder {
    addr: String,
    counters: Mutex<Counters>,
}

impl StatsRecorder {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Record one transmitted echo request.
    pub fn record_sent(&self) {
        self.with_counters(|c| c.sent += 1);
    }

    /// Record one first-seen reply.
    pub fn record_reply(&self, rtt: Duration) {
        self.with_counters(|c| {
            c.recv += 1;
            c.min_rtt = Some(c.min_rtt.map_or(rtt, |min| min.min(rtt)));
            c.max_rtt = c.max_rtt.max(rtt);

            let x = rtt.as_nanos() as f64;
            let delta = x - c.mean_ns;
            c.mean_ns += delta / c.recv as f64;
            c.m2_ns += delta * (x - c.mean_ns);
        });
    }

    /// Record one duplicate reply. Duplicates do not count as received.
    pub fn record_duplicate(&self) {
        self.with_counters(|c| c.duplicates += 1);
    }

    /// Snapshot the counters.
    pub fn snapshot(&self) -> ProbeStatistics {
        self.with_counters(|c| {
            let packet_loss = if c.sent == 0 {
                0.0
            } else {
                (c.sent.saturating_sub(c.recv)) as f64 / c.sent as f64 * 100.0
            };
            let std_dev_ns = if c.recv == 0 {
                0.0
            } else {
                (c.m2_ns / c.recv as f64).sqrt()
            };

            ProbeStatistics {
                addr: self.addr.clone(),
                packets_sent: c.sent,
                packets_recv: c.recv,
                packets_recv_duplicates: c.duplicates,
                packet_loss,
                min_rtt: c.min_rtt.unwrap_or_default(),
                max_rtt: c.max_rtt,
                avg_rtt: Duration::from_nanos(c.mean_ns.round() as u64),
                std_dev_rtt: Duration::from_nanos(std_dev_ns.round() as u64),
            }
        })
    }

    fn with_counters<R>(&self, f: impl FnOnce(&mut Counters) -> R) -> R {
        let mut guard = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

/// A started probe run.
#[derive(Debug)]
pub struct ProbeRun {
    /// Events in the order the facility observed them.
    pub events: mpsc::Receiver<ProbeEvent>,
    /// Cumulative counters of this run.
    pub stats: std::sync::Arc<StatsRecorder>,
    /// Task driving the run; ends after the cancel token fires.
    pub task: JoinHandle<()>,
}

/// Facility able to start a continuous probe against a target.
///
/// Implementations must stop sending events and finish `task` promptly
/// once `cancel` fires.
#[async_trait::async_trait]
pub trait ProbeFacility: Send + Sync + 'static {
    /// Start probing `target` every `interval`.
    ///
    /// # Errors
    /// Returns a creation error when the target cannot be probed
    /// (unresolvable host, socket unavailable, ...).
    async fn start(
        &self,
        target: &str,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Result<ProbeRun, ProbeError>;
}
