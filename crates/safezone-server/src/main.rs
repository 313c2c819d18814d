//! # safezone-server
//!
//! Server for the safezone geofencing system.
//!
//! This binary provides:
//! - WebSocket transport for location reports and live status updates
//! - REST API for report submission and tracking inspection
//! - Care-request relay to connected caregivers
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package safezone-server
//!
//! # With an explicit configuration file
//! SAFEZONE_CONFIG=./config.toml ./safezone-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;
use std::path::PathBuf;

use safezone_core::Config;
use safezone_server::{api, logging, state::AppState};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Environment variable overriding the configuration file location.
const CONFIG_PATH_ENV: &str = "SAFEZONE_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var(CONFIG_PATH_ENV).map_or_else(|_| Config::default_path(), PathBuf::from);
    let config = Config::load_or_default(&config_path)?;
    config.validate()?;

    logging::init(&config.server)?;

    info!(
        config = %config_path.display(),
        data_file = %config.storage.data_file().display(),
        "Starting safezone-server"
    );

    let state = AppState::new(config.clone())?;
    let relay = state.spawn_request_relay();
    let app = api::create_router(state.clone());

    let addr: SocketAddr = config.server.bind_address.parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(relay) = relay {
        relay.abort();
    }
    state.processor().shutdown();
    info!("safezone-server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
