//! Outbound wire records.
//!
//! Observers receive three kinds of text frames, told apart by content:
//! - a bare JSON object: one [`PingResult`]
//! - `STATS:` followed by a JSON object: one [`PingStats`] snapshot
//! - `LOST_PACKET:<seq>`: one [`LostPacketNotice`]

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hub::Frame;
use crate::probe::ProbeStatistics;

/// Prefix of a statistics frame.
pub const STATS_PREFIX: &str = "STATS:";

/// Prefix of a lost packet notice.
pub const LOST_PACKET_PREFIX: &str = "LOST_PACKET:";

/// Error tag carried by duplicate replies.
pub const DUPLICATE_TAG: &str = "duplicate";

/// Errors raised while encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A `LOST_PACKET:` frame without a decimal sequence number.
    #[error("invalid lost packet notice: '{0}'")]
    InvalidNotice(String),
}

/// Convert a duration to milliseconds at microsecond precision.
pub fn duration_to_ms(d: Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}

// =============================================================================
// Ping Result
// =============================================================================

/// Result of one echo reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingResult {
    /// Round-trip time in milliseconds.
    pub latency_ms: Option<f64>,
    /// Time the reply was handled.
    pub timestamp: DateTime<Utc>,
    /// Error tag; `"duplicate"` for repeated replies, omitted when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    /// Sequence number of the echo.
    pub seq: i64,
    /// Sequence numbers skipped since the previous reply.
    pub lost_count: u64,
}

impl PingResult {
    /// Result for a first-seen reply.
    pub fn reply(seq: i64, rtt: Duration, lost_count: u64) -> Self {
        Self {
            latency_ms: Some(duration_to_ms(rtt)),
            timestamp: Utc::now(),
            error: String::new(),
            seq,
            lost_count,
        }
    }

    /// Result for a repeated reply. Never carries a loss count.
    pub fn duplicate(seq: i64, rtt: Duration) -> Self {
        Self {
            latency_ms: Some(duration_to_ms(rtt)),
            timestamp: Utc::now(),
            error: DUPLICATE_TAG.to_string(),
            seq,
            lost_count: 0,
        }
    }

    /// Whether this result describes a repeated reply.
    pub fn is_duplicate(&self) -> bool {
        self.error == DUPLICATE_TAG
    }

    /// Encode as a bare JSON frame.
    pub fn to_frame(&self) -> Result<Frame, WireError> {
        Ok(Frame::from(serde_json::to_string(self)?))
    }
}

// =============================================================================
// Ping Stats
// =============================================================================

/// Cumulative statistics of the current probe session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingStats {
    pub packets_sent: u64,
    pub packets_recv: u64,
    /// Packet loss in percent.
    pub packet_loss: f64,
    pub min_rtt: f64,
    pub max_rtt: f64,
    pub avg_rtt: f64,
    pub std_dev_rtt: f64,
    pub timestamp: DateTime<Utc>,
}

impl PingStats {
    /// Build a snapshot from probe counters, converting RTTs to milliseconds.
    pub fn from_statistics(stats: &ProbeStatistics, timestamp: DateTime<Utc>) -> Self {
        Self {
            packets_sent: stats.packets_sent,
            packets_recv: stats.packets_recv,
            packet_loss: stats.packet_loss,
            min_rtt: duration_to_ms(stats.min_rtt),
            max_rtt: duration_to_ms(stats.max_rtt),
            avg_rtt: duration_to_ms(stats.avg_rtt),
            std_dev_rtt: duration_to_ms(stats.std_dev_rtt),
            timestamp,
        }
    }

    /// Encode as a `STATS:`-prefixed frame.
    pub fn to_frame(&self) -> Result<Frame, WireError> {
        let json = serde_json::to_string(self)?;
        Ok(Frame::from(format!("{STATS_PREFIX}{json}")))
    }
}

// =============================================================================
// Lost Packet Notice
// =============================================================================

/// One sequence number known to have been skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LostPacketNotice {
    pub sequence: i64,
}

impl LostPacketNotice {
    pub fn new(sequence: i64) -> Self {
        Self { sequence }
    }

    pub fn to_frame(&self) -> Frame {
        Frame::from(format!("{LOST_PACKET_PREFIX}{}", self.sequence))
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Any outbound frame, decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Result(PingResult),
    Stats(PingStats),
    LostPacket(LostPacketNotice),
}

impl FromStr for WireMessage {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(json) = s.strip_prefix(STATS_PREFIX) {
            return Ok(Self::Stats(serde_json::from_str(json)?));
        }
        if let Some(seq) = s.strip_prefix(LOST_PACKET_PREFIX) {
            let sequence = seq
                .parse()
                .map_err(|_| WireError::InvalidNotice(s.to_string()))?;
            return Ok(Self::LostPacket(LostPacketNotice::new(sequence)));
        }
        Ok(Self::Result(serde_json::from_str(s)?))
    }
}

impl TryFrom<&Frame> for WireMessage {
    type Error = WireError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        frame.as_str().parse()
    }
}
