//! HTTP request handlers
//!
//! POST bodies are decoded from the raw request body, whatever its content
//! type, and any decoding failure answers 400.

use crate::error::Error;
use crate::playback::{PlayerStatus, RepeatMode};
use crate::state::AppContext;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use jukebox_common::db::{self, Paging, Record};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    volume: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnqueueRequest {
    file: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoveRequest {
    indexes: Vec<i64>,
    delta: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexesRequest {
    indexes: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeRequest {
    volume: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SeekRequest {
    seek: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepeatModeRequest {
    mode: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanPathRequest {
    path: PathBuf,
}

pub type ApiError = (StatusCode, Json<StatusResponse>);
pub type ApiResult<T> = std::result::Result<T, ApiError>;

fn api_error(code: StatusCode, status: impl Into<String>) -> ApiError {
    (
        code,
        Json(StatusResponse {
            status: status.into(),
        }),
    )
}

fn bad_request(status: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, status)
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::BadRequest(msg) => bad_request(msg),
            e => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

fn ok() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        error!("{}: decoding request failed: {}", endpoint, e);
        bad_request("invalid JSON")
    })
}

/// Queue positions from a request. Negative positions can't name an entry,
/// so they are dropped.
fn queue_indexes(indexes: Vec<i64>) -> Vec<usize> {
    indexes
        .into_iter()
        .filter_map(|i| usize::try_from(i).ok())
        .collect()
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "jukebox-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Catalog
// ============================================================================

/// Split a comma separated query value. Absent or empty means no entries.
fn query_list(params: &HashMap<String, String>, key: &str) -> Vec<String> {
    match params.get(key) {
        Some(s) if !s.is_empty() => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn query_number(params: &HashMap<String, String>, key: &str) -> ApiResult<u32> {
    params
        .get(key)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| bad_request(format!("The '{}' parameter is missing or invalid.", key)))
}

/// GET /songmeta - Page through the catalog
///
/// Filters: `artist`, `album`, `title` (case-insensitive substrings).
/// Paging: `page` and `pagesize`, both required. Optional `fields` and
/// `order` are comma separated field names. The final page ends with an
/// `{"eof":"eof"}` element.
pub async fn song_meta(
    State(ctx): State<AppContext>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<Value>>> {
    let start = std::time::Instant::now();

    let mut filter = BTreeMap::new();
    for key in ["artist", "album", "title"] {
        if let Some(v) = params.get(key).filter(|v| !v.is_empty()) {
            filter.insert(key.to_string(), v.clone());
        }
    }

    let page = query_number(&params, "page")?;
    let page_size = query_number(&params, "pagesize")?;

    let query = db::Query {
        fields: query_list(&params, "fields"),
        filter,
        order: query_list(&params, "order"),
        paging: Some(Paging { page_size, page }),
    };

    let result = ctx.catalog.find(&query).await.map_err(Error::from)?;

    let mut body: Vec<Value> = result
        .records
        .into_iter()
        .map(|mut record: Record| {
            if let Some(path) = record.get_mut("path") {
                *path = ctx.prefix.apply(path);
            }
            json!(record)
        })
        .collect();
    if result.eof {
        body.push(json!({ "eof": "eof" }));
    }

    info!("song_meta completed in {:?}", start.elapsed());
    Ok(Json(body))
}

// ============================================================================
// Player
// ============================================================================

/// GET /player/play
pub async fn play(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    ctx.player.play().await.map_err(|e| {
        error!("play: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(ok())
}

/// GET /player/pause
pub async fn pause(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    ctx.player.pause().await?;
    Ok(ok())
}

/// GET /player/stop
pub async fn stop(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    ctx.player.stop().await?;
    Ok(ok())
}

/// GET /player/status
pub async fn status(State(ctx): State<AppContext>) -> ApiResult<Json<PlayerStatus>> {
    Ok(Json(ctx.player.status().await?))
}

/// GET /player/volume
pub async fn get_volume(State(ctx): State<AppContext>) -> ApiResult<Json<VolumeResponse>> {
    let volume = ctx.player.volume().await.map_err(|e| {
        error!("get_volume: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(VolumeResponse { volume }))
}

/// POST /player/volume {Volume}
pub async fn set_volume(State(ctx): State<AppContext>, body: Bytes) -> ApiResult<Json<StatusResponse>> {
    let req: VolumeRequest = decode("set_volume", &body)?;
    let volume = req.volume.clamp(0, 100) as u8;
    ctx.player.set_volume(volume).await?;
    Ok(ok())
}

/// POST /player/seek {Seek}
pub async fn seek(State(ctx): State<AppContext>, body: Bytes) -> ApiResult<Json<StatusResponse>> {
    let req: SeekRequest = decode("seek", &body)?;
    info!("seek {}", req.seek);
    ctx.player.seek(req.seek).await?;
    Ok(ok())
}

/// POST /player/repeat_mode {Mode}
pub async fn set_repeat_mode(State(ctx): State<AppContext>, body: Bytes) -> ApiResult<Json<StatusResponse>> {
    let req: RepeatModeRequest = decode("set_repeat_mode", &body)?;
    let mode: RepeatMode = req.mode.parse().map_err(|e: String| {
        warn!("set_repeat_mode: {}", e);
        bad_request("Bad repeat mode")
    })?;
    ctx.set_repeat_mode(mode).await?;
    Ok(ok())
}

// ============================================================================
// Queue
// ============================================================================

/// POST /player/queue.enqueue {File}
pub async fn enqueue(State(ctx): State<AppContext>, body: Bytes) -> ApiResult<Json<StatusResponse>> {
    let req: EnqueueRequest = decode("enqueue", &body)?;
    info!("Enqueuing file {}", req.file);
    ctx.queue.enqueue(req.file).await?;
    Ok(ok())
}

/// POST /player/queue.move {Indexes, Delta}
pub async fn move_entries(State(ctx): State<AppContext>, body: Bytes) -> ApiResult<Json<StatusResponse>> {
    let req: MoveRequest = decode("move", &body)?;
    ctx.queue
        .move_entries(queue_indexes(req.indexes), req.delta)
        .await?;
    Ok(ok())
}

/// POST /player/queue.move_to_top {Indexes}
pub async fn move_to_top(State(ctx): State<AppContext>, body: Bytes) -> ApiResult<Json<StatusResponse>> {
    let req: IndexesRequest = decode("move_to_top", &body)?;
    ctx.queue.move_to_top(queue_indexes(req.indexes)).await?;
    Ok(ok())
}

/// POST /player/queue.remove {Indexes}
pub async fn remove(State(ctx): State<AppContext>, body: Bytes) -> ApiResult<Json<StatusResponse>> {
    let req: IndexesRequest = decode("remove", &body)?;
    ctx.queue.remove(queue_indexes(req.indexes)).await?;
    Ok(ok())
}

/// POST /player/queue.clear
pub async fn clear(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    ctx.queue.clear().await?;
    Ok(ok())
}

// ============================================================================
// Scanning
// ============================================================================

/// GET /scan/all - Scan every configured directory
pub async fn scan_all(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    if ctx.dirs.is_empty() {
        info!("scan_all: scan requested but no directories to scan");
        return Err(api_error(StatusCode::NOT_FOUND, "no directories to scan"));
    }
    start_scan(&ctx, ctx.dirs.clone()).await
}

/// POST /scan/path {Path}
pub async fn scan_path(State(ctx): State<AppContext>, body: Bytes) -> ApiResult<Json<StatusResponse>> {
    let req: ScanPathRequest = decode("scan_path", &body)?;
    start_scan(&ctx, vec![req.path]).await
}

async fn start_scan(ctx: &AppContext, dirs: Vec<PathBuf>) -> ApiResult<Json<StatusResponse>> {
    let started = ctx.scanner.start(dirs).await?;
    let status = if started { "scanning" } else { "already scanning" };
    Ok(Json(StatusResponse {
        status: status.to_string(),
    }))
}
