//! pulsed - presence and pulse hub.
//!
//! Clients connect over WebSocket, announce a user id and receive
//! online/offline updates for their linked peers, plus pulse and double
//! pulse notifications.

mod config;
mod error;
mod http;
mod metrics;
mod network;
mod state;
mod telemetry;

use crate::config::Config;
use crate::network::Gateway;
use crate::state::Hub;
use crate::state::managers::spawn_sweep_task;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let mut config = load_config()?;
    config.apply_env_overrides().map_err(|e| {
        error!(error = %e, "Invalid environment override");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("configuration has {} error(s)", errors.len());
    }

    info!(
        server = %config.server.name,
        address = %config.listen.address,
        users = config.links.len(),
        heartbeat_timeout_ms = config.heartbeat.timeout_ms,
        pulse_window_ms = config.pulse.window_ms,
        "Starting pulsed"
    );
    if config.links.is_empty() {
        warn!("Link graph is empty; no presence updates will be delivered");
    }

    // Create the Hub (shared state)
    let hub = Arc::new(Hub::from_config(&config));

    // Prometheus metrics are optional.
    // Convention: absent or 0 disables the HTTP endpoint (used by tests).
    match config.server.metrics_port {
        Some(port) if port != 0 => {
            metrics::init();
            tokio::spawn(async move {
                http::run_http_server(port).await;
            });
            info!(port, "Prometheus HTTP server started");
        }
        _ => info!("Metrics disabled"),
    }

    // Start heartbeat sweep
    let sweep = spawn_sweep_task(Arc::clone(&hub));
    info!(
        interval_ms = config.heartbeat.sweep_interval_ms,
        "Heartbeat sweep task started"
    );

    let gateway = Gateway::bind(config.listen.clone(), Arc::clone(&hub)).await?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl-C, shutting down"),
                Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
            }
            shutdown.cancel();
        });
    }

    let result = gateway.run(shutdown).await;
    sweep.abort();
    info!("pulsed stopped");
    result
}

/// Load the config named on the command line, or `config.toml`.
///
/// A missing default file falls back to built-in defaults; an explicitly
/// named file must exist.
fn load_config() -> anyhow::Result<Config> {
    let explicit = std::env::args().nth(1);
    let path = explicit
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    if explicit.is_none() && !Path::new(&path).exists() {
        warn!(path = %path, "Config file not found, using defaults");
        return Ok(Config::default());
    }

    Config::load(&path).map_err(|e| {
        error!(path = %path, error = %e, "Failed to load config");
        e.into()
    })
}
