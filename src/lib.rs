//! LivePing - Real-time Reachability Monitor
//!
//! This crate continuously probes one network target and pushes every echo
//! result, loss notice and periodic statistics snapshot to all connected
//! WebSocket observers. It can be used as a library, or run as a standalone
//! binary with the `liveping` executable.
//!
//! # Architecture
//!
//! - **Hub**: single actor task owning the observer set; all register,
//!   unregister and broadcast requests are serialized through its channel
//! - **Probe**: controller driving a [`ProbeFacility`], tracking sequence
//!   continuity and restarting the session on request
//! - **Stats**: periodic aggregate snapshots tied to one probe session
//! - **Server**: Axum router serving the observer page and the `/ws` endpoint
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use liveping::{ControllerBuilder, HubBuilder, IcmpFacility, ProbeConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let shutdown = CancellationToken::new();
//! let hub = HubBuilder::new().cancel_token(&shutdown).build();
//!
//! let config = ProbeConfig::new("1.1.1.1");
//! let facility = Arc::new(IcmpFacility::from_config(&config));
//! let controller = ControllerBuilder::new(facility, hub.handle(), config)
//!     .cancel_token(&shutdown)
//!     .build();
//! controller.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod hub;
pub mod probe;
pub mod server;
pub mod wire;

pub use config::{AppConfig, ConfigError, HubConfig, ServerConfig};
pub use hub::{Frame, FrameSink, Hub, HubBuilder, HubError, HubHandle, Observer, ObserverId};
pub use probe::{
    ControllerBuilder, EchoReply, IcmpFacility, ProbeConfig, ProbeController, ProbeError,
    ProbeEvent, ProbeFacility, ProbeRun, ProbeSession, ProbeStatistics, StatsRecorder,
};
pub use wire::{LostPacketNotice, PingResult, PingStats, WireError, WireMessage};
