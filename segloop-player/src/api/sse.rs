//! Server-Sent Events streams
//!
//! `/events` carries scheduler events to any listener; `/embed/commands`
//! carries engine commands to the embed page driving the real player.

use crate::api::server::AppContext;
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive")
}

/// GET /events - SSE event stream
pub async fn event_stream(State(ctx): State<AppContext>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    let rx = ctx.state.subscribe_events();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged: the client missed events but stays connected
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(keep_alive())
}

/// GET /embed/commands - engine commands for the embed page
pub async fn embed_command_stream(
    State(ctx): State<AppContext>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let bridge = ctx.bridge.as_ref().ok_or(StatusCode::NOT_FOUND)?;
    let rx = bridge.subscribe_commands();
    debug!("Embed client connected ({} total)", bridge.connected_clients());

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(command) => match serde_json::to_string(&command) {
                Ok(json) => Some(Ok(Event::default().event("command").data(json))),
                Err(e) => {
                    warn!("Failed to serialize engine command: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Embed command stream error: {:?}", e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(keep_alive()))
}
