//! Probe session state and sequence continuity tracking.

use std::time::Duration;

use crate::wire::{LostPacketNotice, PingResult};

/// `last_seq` value meaning "no reply observed since the session started".
pub const NO_REPLY_SEQ: i64 = -1;

/// Number of sequence numbers skipped between `last_seq` and `seq`.
pub fn lost_between(last_seq: i64, seq: i64) -> u64 {
    seq.saturating_sub(last_seq).saturating_sub(1).max(0) as u64
}

/// Records produced by one non-duplicate reply, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyOutcome {
    /// One notice per skipped sequence, ascending. Delivered first.
    pub lost: Vec<LostPacketNotice>,
    /// Result for the reply itself. Delivered last.
    pub result: PingResult,
}

/// Live state of one continuous probing run against one target.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSession {
    target: String,
    interval: Duration,
    last_seq: i64,
    running: bool,
    finished: bool,
    generation: u64,
}

impl ProbeSession {
    /// Create a running session with no replies observed.
    pub fn new(target: impl Into<String>, interval: Duration, generation: u64) -> Self {
        Self {
            target: target.into(),
            interval,
            last_seq: NO_REPLY_SEQ,
            running: true,
            finished: false,
            generation,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Highest sequence number replied to, or [`NO_REPLY_SEQ`].
    pub fn last_seq(&self) -> i64 {
        self.last_seq
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the probe reported its final statistics.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Identity of this session among all sessions of one controller.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Account for a first-seen reply.
    ///
    /// A reply older than `last_seq` (reordered) reports no loss and leaves
    /// `last_seq` where it is.
    pub fn observe_reply(&mut self, seq: i64, rtt: Duration) -> ReplyOutcome {
        let lost_count = lost_between(self.last_seq, seq);
        let lost = if lost_count > 0 {
            (self.last_seq + 1..seq).map(LostPacketNotice::new).collect()
        } else {
            Vec::new()
        };
        self.last_seq = self.last_seq.max(seq);

        ReplyOutcome {
            lost,
            result: PingResult::reply(seq, rtt, lost_count),
        }
    }

    /// Build the result for a repeated reply. Never touches `last_seq`.
    pub fn observe_duplicate(&self, seq: i64, rtt: Duration) -> PingResult {
        PingResult::duplicate(seq, rtt)
    }

    pub(crate) fn mark_finished(&mut self) {
        self.finished = true;
    }

    pub(crate) fn stop(&mut self) {
        self.running = false;
    }
}
