//! LivePing Binary Entry Point
//!
//! Probes one target and streams the results to every browser connected
//! to the web server. Core functionality lives in the `liveping` library.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use liveping::{
    AppConfig, ControllerBuilder, HubBuilder, IcmpFacility,
    config::parse_duration,
    server::{self, AppState},
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// LivePing - Real-time Reachability Monitor
#[derive(Parser, Debug)]
#[command(name = "liveping", version, about, long_about = None)]
struct Cli {
    /// Host to probe (hostname or IP address)
    #[arg(env = "LIVEPING_TARGET")]
    target: Option<String>,

    /// Path to an optional YAML configuration file
    #[arg(short, long, env = "LIVEPING_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address for the web server, e.g. ":8080" (overrides config file)
    #[arg(short, long, env = "LIVEPING_LISTEN")]
    listen: Option<String>,

    /// Echo interval, e.g. "100ms" (overrides config file)
    #[arg(short, long, env = "LIVEPING_INTERVAL", value_parser = parse_duration)]
    interval: Option<Duration>,

    /// Log every echo reply
    #[arg(short, long, env = "LIVEPING_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,liveping=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(target) = cli.target {
        config.probe.target = target;
    }
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if let Some(interval) = cli.interval {
        config.probe.interval = interval;
    }
    config.verbose |= cli.verbose;
    config.validate()?;

    tracing::info!(
        "Target: {}, interval: {:?}, listen: {}",
        config.probe.target,
        config.probe.interval,
        config.server.bind_address(),
    );

    let root = CancellationToken::new();
    let hub = HubBuilder::from_config(&config.hub)
        .cancel_token(&root)
        .build();

    let facility = Arc::new(IcmpFacility::from_config(&config.probe));
    let controller = ControllerBuilder::new(facility, hub.handle(), config.probe.clone())
        .verbose(config.verbose)
        .cancel_token(&root)
        .build();

    // A failed first start leaves the probe idle until an observer sends RESTART
    if let Err(e) = controller.start().await {
        tracing::warn!(error = %e, "Probe not started, waiting for restart");
    }

    let listener = tokio::net::TcpListener::bind(config.server.bind_address()).await?;
    tracing::info!("Web server listening on: http://{}", listener.local_addr()?);
    tracing::info!("Press Ctrl+C to shutdown");

    let state = AppState {
        hub: hub.handle(),
        controller: controller.clone(),
        shutdown: root.child_token(),
    };
    // Stops the probe before any socket is closed
    server::serve(listener, state, shutdown_signal()).await?;

    // No-op after a signal; covers the server failing on its own
    controller.shutdown().await;

    tracing::info!("Closing observers...");
    if let Err(e) = hub.shutdown().await {
        tracing::error!("Failed to shutdown hub: {}", e);
    }
    root.cancel();

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
