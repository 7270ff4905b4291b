//! HTTP request handlers
//!
//! Player operations are silent no-ops in states where they do not apply, so
//! most control endpoints answer `ok` unconditionally. Clients observe the
//! outcome through `/playback/status` or the SSE stream.

use crate::api::server::AppContext;
use crate::state::PlayerStatus;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

impl StatusResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            status: "ok".to_string(),
        })
    }

    fn error(code: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            code,
            Json(Self {
                status: format!("error: {}", message.into()),
            }),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    topic: String,
    tracks: Vec<PlaylistEntry>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistEntry {
    index: usize,
    chapter_number: u32,
    title: String,
    author: String,
    description: String,
    /// Fully enriched record available (instant playback)
    ready: bool,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<StatusResponse>)>;

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "chaptercast-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
    })
}

// ============================================================================
// Playlist / Status
// ============================================================================

/// GET /playlist - Chapter list with cache readiness
pub async fn get_playlist(State(ctx): State<AppContext>) -> Json<PlaylistResponse> {
    let playlist = ctx.player.playlist();
    let tracks = playlist
        .tracks()
        .iter()
        .map(|track| PlaylistEntry {
            index: track.index,
            chapter_number: track.chapter_number,
            title: track.title.clone(),
            author: track.author.clone(),
            description: track.description.clone(),
            ready: ctx
                .player
                .cached_track(track.index)
                .is_some_and(|cached| cached.is_fully_enriched()),
        })
        .collect();

    Json(PlaylistResponse {
        topic: playlist.topic.clone(),
        tracks,
    })
}

/// GET /playback/status - Current index, player state and track snapshot
pub async fn get_status(State(ctx): State<AppContext>) -> Json<PlayerStatus> {
    Json(ctx.state.status())
}

// ============================================================================
// Playback Control
// ============================================================================

/// POST /playback/track/:index - Make a track current
pub async fn switch_track(
    State(ctx): State<AppContext>,
    Path(index): Path<usize>,
) -> ApiResult<StatusResponse> {
    if ctx.player.is_closed() {
        return Err(StatusResponse::error(StatusCode::CONFLICT, "player closed"));
    }
    if index >= ctx.player.playlist().len() {
        return Err(StatusResponse::error(
            StatusCode::NOT_FOUND,
            format!("no track at index {}", index),
        ));
    }

    info!(index, "Switch track requested");
    ctx.player.switch_to(index);
    Ok(StatusResponse::ok())
}

/// POST /playback/toggle - Play/pause
pub async fn toggle(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    match ctx.player.toggle_play_pause().await {
        Ok(()) => Ok(StatusResponse::ok()),
        Err(e) => {
            error!("Toggle failed: {}", e);
            Err(StatusResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// POST /playback/next - Skip to next track
pub async fn skip_next(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    info!("Next requested");
    ctx.player.next();
    StatusResponse::ok()
}

/// POST /playback/previous - Go back one track
pub async fn skip_previous(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    info!("Previous requested");
    ctx.player.previous();
    StatusResponse::ok()
}
