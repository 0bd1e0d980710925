//! HTTP server setup and routing

use crate::engine::BridgeEngine;
use crate::error::{Error, Result};
use crate::playlist::Playlist;
use crate::scheduler::SchedulerHandle;
use crate::state::SharedState;
use crate::visibility::VisibilitySignal;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub scheduler: SchedulerHandle,
    pub playlist: Arc<Playlist>,
    pub visibility: VisibilitySignal,
    /// Present when playback runs in an embed page
    pub bridge: Option<Arc<BridgeEngine>>,
    pub engine_name: &'static str,
}

/// Build the router with all routes
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        // Playback control
        .route("/playback/state", get(super::handlers::get_playback_state))
        .route("/playback/play", post(super::handlers::play))
        .route("/playback/pause", post(super::handlers::pause))
        .route("/playback/next", post(super::handlers::next))
        .route("/playback/stop", post(super::handlers::stop))
        .route("/playback/select/:segment_id", post(super::handlers::select))
        .route("/playback/mode", post(super::handlers::set_mode))
        // Playlist
        .route("/playlist", get(super::handlers::get_playlist))
        .route("/playlist/entries", post(super::handlers::add_entry))
        .route(
            "/playlist/entries/:segment_id",
            put(super::handlers::update_entry).delete(super::handlers::remove_entry),
        )
        // Client visibility
        .route("/visibility", post(super::handlers::set_visibility))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        // Embed bridge
        .route("/embed/commands", get(super::sse::embed_command_stream))
        .route("/embed/report", post(super::handlers::embed_report))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn run<F>(port: u16, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(ctx);

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
