mod api;
mod catalog;
mod config;
mod directory;
mod error;
mod resolver;
mod services;

use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use crate::config::Config;

/// Read-only node directory over a Consul service catalog
#[derive(Debug, Parser)]
#[command(name = "node-directoryd", version)]
struct Cli {
    /// Path to the JSON (or .toml) configuration file
    #[arg(value_name = "PATH")]
    config: PathBuf,

    /// Listen address, overriding listen_host/listen_port from the config
    #[arg(long, value_name = "HOST:PORT")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    // Initialize tracing
    let default_filter = if config.debug {
        "node_directoryd=debug,tower_http=debug"
    } else {
        "node_directoryd=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter))
        )
        .init();

    tracing::info!("Starting node-directoryd");
    tracing::info!(
        "Loaded config from {} ({} projects, catalog at {})",
        cli.config.display(),
        config.projects.len(),
        config.directory.catalog.base_url()
    );

    // Build one catalog client per scope
    let app_state = api::routes::AppState::from_config(&config)?;
    let app = api::routes::router(app_state);

    // Bind HTTP server
    let listen = cli.listen.unwrap_or_else(|| config.listen_addr());
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind to {}", listen))?;

    tracing::info!("API listening on {}", listen);

    // Run server with graceful shutdown
    let cancel = CancellationToken::new();
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    cancel.cancel();
    let _ = server_handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
