//! Phoneprov Daemon - desk phone provisioning service.
//!
//! This is the main entry point for the Phoneprov daemon, which serves
//! phone configuration over HTTP: provisioning and staging endpoints for
//! the devices themselves, tokened one-time downloads, and the JSON
//! operator API.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod access;
mod config;
mod signals;

use phoneprov_db::Database;
use phoneprov_http::{AppState, build_router};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("phoneprov=info".parse()?)
                .add_directive("phoneprov_daemon=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Phoneprov daemon");

    // Load configuration
    let config = config::load_config()?;
    info!("Configuration loaded");

    // Open database
    let db = match config.database.path.clone() {
        Some(path) => Database::open_at(path),
        None => Database::open(),
    }
    .context("Failed to open database")?;
    info!(schema = db.schema_version()?, "Database initialized");

    // Build the operator table
    let access = Arc::new(access::StaticAccessControl::from_entries(&config.operators));
    if access.is_empty() {
        warn!("No usable operator accounts configured; the /api surface will refuse everything");
    } else {
        info!(operators = access.len(), "Operator accounts loaded");
    }

    let state = AppState::new(db, config.provision_settings(), access);

    // Set up signal handling
    let mut shutdown_rx = signals::setup_signal_handlers()?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener =
        TcpListener::bind(&addr).await.with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    info!("Phoneprov daemon stopped");
    Ok(())
}
