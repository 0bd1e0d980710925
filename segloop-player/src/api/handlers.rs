//! HTTP request handlers
//!
//! Playback commands are queued to the scheduler and answered immediately;
//! their effect shows up in `/playback/state` and on the event stream.

use crate::api::server::AppContext;
use crate::engine::EngineReport;
use crate::error::Error;
use crate::scheduler::UserCommand;
use crate::state::{FailureCounts, PlaybackStatus};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use segloop_common::events::TimerBackendKind;
use segloop_common::models::PlaylistEntry;
use segloop_common::{time_spec, PlaybackMode, Segment, SegmentId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_timestamp: String,
    build_profile: String,
    engine: String,
    timer_backend: Option<TimerBackendKind>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
pub struct PlaybackStateResponse {
    #[serde(flatten)]
    status: PlaybackStatus,
    failures: FailureCounts,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    mode: PlaybackMode,
}

/// Offset given either in seconds or as a time string ("1:30")
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OffsetValue {
    Seconds(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct AddEntryRequest {
    source_id: String,
    #[serde(default)]
    start: Option<OffsetValue>,
    #[serde(default)]
    end: Option<OffsetValue>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEntryRequest {
    #[serde(default)]
    start: Option<OffsetValue>,
    #[serde(default)]
    end: Option<OffsetValue>,
}

#[derive(Debug, Serialize)]
pub struct EntryView {
    id: SegmentId,
    source_id: String,
    start_offset_seconds: Option<f64>,
    end_offset_seconds: Option<f64>,
    /// Offsets as time strings, empty when unset
    start: String,
    end: String,
    failed: bool,
}

impl From<&Segment> for EntryView {
    fn from(segment: &Segment) -> Self {
        Self {
            id: segment.id,
            source_id: segment.source_id.clone(),
            start_offset_seconds: segment.start_offset_seconds,
            end_offset_seconds: segment.end_offset_seconds,
            start: time_spec::format(segment.start_offset_seconds),
            end: time_spec::format(segment.end_offset_seconds),
            failed: false,
        }
    }
}

impl From<&PlaylistEntry> for EntryView {
    fn from(entry: &PlaylistEntry) -> Self {
        Self {
            failed: entry.failed,
            ..EntryView::from(&entry.segment)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    entries: Vec<EntryView>,
    current_id: Option<SegmentId>,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    visible: bool,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = std::result::Result<T, ApiError>;

fn api_error(e: Error) -> ApiError {
    let status = match &e {
        Error::NotFound(_) | Error::Common(segloop_common::Error::NotFound(_)) => StatusCode::NOT_FOUND,
        Error::BadRequest(_) | Error::Common(segloop_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
        Error::InvalidState(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!("Request failed: {}", e);
    } else {
        debug!("Request rejected: {}", e);
    }
    (status, Json(ErrorResponse { error: e.to_string() }))
}

fn ok() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

/// Resolve an optional offset; blank strings mean "unset"
fn resolve_offset(value: Option<OffsetValue>, field: &str) -> crate::Result<Option<f64>> {
    match value {
        None => Ok(None),
        Some(OffsetValue::Seconds(seconds)) if seconds.is_finite() && seconds >= 0.0 => Ok(Some(seconds)),
        Some(OffsetValue::Seconds(seconds)) => Err(Error::BadRequest(format!("{} offset {} is not a valid time", field, seconds))),
        Some(OffsetValue::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(OffsetValue::Text(text)) => time_spec::parse(&text)
            .map(Some)
            .ok_or_else(|| Error::BadRequest(format!("{} offset '{}' is not a valid time", field, text))),
    }
}

fn command(ctx: &AppContext, command: UserCommand) -> ApiResult<Json<StatusResponse>> {
    info!("Playback command: {:?}", command);
    ctx.scheduler.send(command).map_err(api_error)?;
    Ok(ok())
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    let status = ctx.state.status().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "segloop-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        engine: ctx.engine_name.to_string(),
        timer_backend: status.timer_backend,
    })
}

// ============================================================================
// Playback Control Endpoints
// ============================================================================

/// GET /playback/state
pub async fn get_playback_state(State(ctx): State<AppContext>) -> Json<PlaybackStateResponse> {
    Json(PlaybackStateResponse {
        status: ctx.state.status().await,
        failures: ctx.state.failure_counts(),
    })
}

/// POST /playback/play
pub async fn play(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    command(&ctx, UserCommand::Play)
}

/// POST /playback/pause
pub async fn pause(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    command(&ctx, UserCommand::Pause)
}

/// POST /playback/next
pub async fn next(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    command(&ctx, UserCommand::Next)
}

/// POST /playback/stop
pub async fn stop(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    command(&ctx, UserCommand::Stop)
}

/// POST /playback/select/:segment_id
pub async fn select(
    State(ctx): State<AppContext>,
    Path(segment_id): Path<SegmentId>,
) -> ApiResult<Json<StatusResponse>> {
    if ctx.playlist.get(segment_id).await.is_none() {
        return Err(api_error(Error::NotFound(format!("segment {}", segment_id))));
    }
    command(&ctx, UserCommand::Select(segment_id))
}

/// POST /playback/mode
pub async fn set_mode(
    State(ctx): State<AppContext>,
    Json(req): Json<ModeRequest>,
) -> ApiResult<Json<StatusResponse>> {
    command(&ctx, UserCommand::SetMode(req.mode))
}

// ============================================================================
// Playlist Endpoints
// ============================================================================

/// GET /playlist
pub async fn get_playlist(State(ctx): State<AppContext>) -> Json<PlaylistResponse> {
    let entries = ctx.playlist.entries().await;
    Json(PlaylistResponse {
        entries: entries.iter().map(EntryView::from).collect(),
        current_id: ctx.playlist.current_id().await,
    })
}

/// POST /playlist/entries
pub async fn add_entry(
    State(ctx): State<AppContext>,
    Json(req): Json<AddEntryRequest>,
) -> ApiResult<(StatusCode, Json<EntryView>)> {
    let start = resolve_offset(req.start, "start").map_err(api_error)?;
    let end = resolve_offset(req.end, "end").map_err(api_error)?;
    if req.source_id.trim().is_empty() {
        return Err(api_error(Error::BadRequest("source_id must not be empty".to_string())));
    }

    let segment = Segment::new(req.source_id.trim(), start, end).map_err(|e| api_error(e.into()))?;
    ctx.playlist.add(segment.clone()).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(EntryView::from(&segment))))
}

/// PUT /playlist/entries/:segment_id
pub async fn update_entry(
    State(ctx): State<AppContext>,
    Path(segment_id): Path<SegmentId>,
    Json(req): Json<UpdateEntryRequest>,
) -> ApiResult<Json<EntryView>> {
    let start = resolve_offset(req.start, "start").map_err(api_error)?;
    let end = resolve_offset(req.end, "end").map_err(api_error)?;

    let segment = ctx
        .playlist
        .update_offsets(segment_id, start, end)
        .await
        .map_err(api_error)?;
    let failed = ctx.playlist.is_failed(segment_id).await;
    Ok(Json(EntryView {
        failed,
        ..EntryView::from(&segment)
    }))
}

/// DELETE /playlist/entries/:segment_id
pub async fn remove_entry(
    State(ctx): State<AppContext>,
    Path(segment_id): Path<SegmentId>,
) -> ApiResult<StatusCode> {
    ctx.playlist.remove(segment_id).await.map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Visibility and Embed Endpoints
// ============================================================================

/// POST /visibility
pub async fn set_visibility(
    State(ctx): State<AppContext>,
    Json(req): Json<VisibilityRequest>,
) -> Json<StatusResponse> {
    if ctx.visibility.set(req.visible) {
        debug!("Visibility reported: {}", req.visible);
    }
    ok()
}

/// POST /embed/report
pub async fn embed_report(
    State(ctx): State<AppContext>,
    Json(report): Json<EngineReport>,
) -> ApiResult<Json<StatusResponse>> {
    let bridge = ctx
        .bridge
        .as_ref()
        .ok_or_else(|| api_error(Error::NotFound("embed bridge is not enabled".to_string())))?;
    bridge.report(report);
    Ok(ok())
}
