//! HTTP server setup and routing

use crate::error::{Error, Result};
use crate::state::AppContext;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the router with every endpoint. When `www` is given, unmatched paths
/// are served from that directory.
pub fn create_router(ctx: AppContext, www: Option<PathBuf>) -> Router {
    let app = Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Catalog
        .route("/songmeta", get(super::handlers::song_meta))

        // Player control
        .route("/player/play", get(super::handlers::play))
        .route("/player/pause", get(super::handlers::pause))
        .route("/player/stop", get(super::handlers::stop))
        .route("/player/status", get(super::handlers::status))
        .route(
            "/player/volume",
            get(super::handlers::get_volume).post(super::handlers::set_volume),
        )
        .route("/player/seek", post(super::handlers::seek))
        .route("/player/repeat_mode", post(super::handlers::set_repeat_mode))

        // Queue
        .route("/player/queue.enqueue", post(super::handlers::enqueue))
        .route("/player/queue.move", post(super::handlers::move_entries))
        .route("/player/queue.move_to_top", post(super::handlers::move_to_top))
        .route("/player/queue.remove", post(super::handlers::remove))
        .route("/player/queue.clear", post(super::handlers::clear))

        // Scanning
        .route("/scan/all", get(super::handlers::scan_all))
        .route("/scan/path", post(super::handlers::scan_path))

        // Event stream
        .route("/playerEvents", get(super::websocket::player_events))

        .with_state(ctx);

    let app = match www {
        Some(dir) => {
            info!("Serving web UI from {}", dir.display());
            app.fallback_service(ServeDir::new(dir))
        }
        None => app,
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve `ctx` on `port` until `shutdown` completes
pub async fn run(
    ctx: AppContext,
    port: u16,
    www: Option<PathBuf>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = create_router(ctx, www);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
