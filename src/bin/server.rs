//! MT5 trading backend server — headless, HTTP-only (§6): control, ticks,
//! trades, and log ingestion each bound to their own port, sharing one
//! SQLite-backed application state.
//!
//! # Usage
//! ```sh
//! DATABASE_URL=sqlite://data/mt5backend.db cargo run --bin server
//! ```
//!
//! Metrics are exposed for Prometheus scraping at `/metrics` on the control
//! port rather than pushed, so `OBSERVABILITY_INTERVAL` only gates whether
//! the interval workers log their own health at startup.

use anyhow::Result;
use rustrade::application::system::Application;
use rustrade::config::Config;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("mt5 trading backend {} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(
        control_port = config.control_port,
        tick_port = config.tick_port,
        trade_port = config.trade_port,
        log_port = config.log_port,
        "configuration loaded"
    );

    info!("building application...");
    let app = Application::build(config).await?;

    info!("starting supervised workers and http surfaces...");
    let handle = app.start().await?;
    info!("server running. press ctrl+c to shut down.");

    tokio::signal::ctrl_c().await?;
    handle.shutdown().await;

    Ok(())
}
