//! HTTP server setup and routing
//!
//! Control endpoints for the player plus the SSE event stream.

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::playback::Player;
use crate::state::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub player: Arc<Player>,
    pub state: Arc<SharedState>,
}

impl AppContext {
    pub fn new(player: Arc<Player>) -> Self {
        let state = player.shared_state();
        Self { player, state }
    }
}

/// Build the router with all routes
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        .route("/playlist", get(super::handlers::get_playlist))
        // Playback control
        .route("/playback/status", get(super::handlers::get_status))
        .route("/playback/track/:index", post(super::handlers::switch_track))
        .route("/playback/toggle", post(super::handlers::toggle))
        .route("/playback/next", post(super::handlers::skip_next))
        .route("/playback/previous", post(super::handlers::skip_previous))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run HTTP API server until `shutdown` resolves
pub async fn run<F>(config: &ApiConfig, player: Arc<Player>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(AppContext::new(player));

    let addr = format!("{}:{}", config.bind, config.port);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
