//! Jukebox Audio Player (jukebox-ap) - Main entry point
//!
//! Serves the player, queue, catalog and scanner over HTTP, with a
//! WebSocket stream of player events.

use anyhow::{Context, Result};
use clap::Parser;
use jukebox_ap::audio::NativeBackend;
use jukebox_ap::config::{Args, Config};
use jukebox_ap::{api, AppContext};
use jukebox_common::config::generate_config;
use jukebox_common::db::open_database;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Connections in the pool serving requests
const DB_MAX_CONNECTIONS: u32 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.gen_config {
        let dir = std::env::current_dir().context("Failed to read current directory")?;
        let path = generate_config(&dir).context("Failed to generate config file")?;
        println!("Wrote sample config to {}", path.display());
        return Ok(());
    }

    let config = Config::load(&args).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "jukebox_ap={level},jukebox_common={level},tower_http=info",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jukebox-ap on port {}", config.port);
    info!("Database: {}", config.db_path.display());
    if !config.prefix.is_empty() {
        info!("Path prefix: {}", config.prefix);
    }

    let pool = open_database(&config.db_path, config.db_open_timeout, DB_MAX_CONNECTIONS)
        .await
        .context("Failed to open database")?;

    let ctx = AppContext::start(&config, Box::new(NativeBackend::new()), pool)
        .await
        .context("Failed to start player")?;

    api::run(ctx, config.port, config.www.clone(), shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
