//! Probe Layer
//!
//! Continuous probing of one target, with sequence continuity tracking and
//! periodic statistics, driven by a pluggable probing facility.
//!
//! # Architecture
//!
//! - [`ProbeFacility`]: Starts a probe run and streams [`ProbeEvent`]s
//! - [`IcmpFacility`]: ICMP echo implementation built on `surge-ping`
//! - [`ProbeController`]: Owns the [`ProbeSession`], dispatches events, restarts
//! - `StatsAggregator`: Periodic statistics snapshots tied to one session
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use liveping::{ControllerBuilder, HubBuilder, IcmpFacility, ProbeConfig};
//!
//! # async fn run() -> Result<(), liveping::ProbeError> {
//! let hub = HubBuilder::new().build();
//! let config = ProbeConfig::new("example.com").with_interval(Duration::from_millis(200));
//! let facility = Arc::new(IcmpFacility::from_config(&config));
//! let controller = ControllerBuilder::new(facility, hub.handle(), config).build();
//! controller.start().await?;
//! controller.restart().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod controller;
mod error;
mod facility;
mod icmp;
mod session;
mod stats;

pub use config::{DEFAULT_INTERVAL, DEFAULT_STATS_INTERVAL, ProbeConfig};
pub use controller::{ControllerBuilder, ProbeController};
pub use error::ProbeError;
pub use facility::{EchoReply, ProbeEvent, ProbeFacility, ProbeRun, ProbeStatistics, StatsRecorder};
pub use icmp::IcmpFacility;
pub use session::{NO_REPLY_SEQ, ProbeSession, ReplyOutcome, lost_between};
