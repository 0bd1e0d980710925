//! Integration tests for the segloop-player API
//!
//! Tests the HTTP surface against a running scheduler:
//! - Health and playback state
//! - Playlist management
//! - Playback commands
//! - Visibility reports
//! - Embed bridge (command stream and reports)

mod helpers;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use helpers::{test_config, RecordingEngine};
use http_body_util::BodyExt;
use segloop_common::db::MemoryStore;
use segloop_common::events::EventBus;
use segloop_common::time::SystemClock;
use segloop_common::{EngineState, PlaybackMode};
use segloop_player::api::{build_router, AppContext};
use segloop_player::engine::{BridgeEngine, EngineEvent, PlaybackEngine};
use segloop_player::playlist::Playlist;
use segloop_player::scheduler::{PlaybackScheduler, SchedulerDeps};
use segloop_player::state::SharedState;
use segloop_player::visibility::VisibilitySignal;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

struct TestServer {
    app: axum::Router,
    ctx: AppContext,
    /// Kept open so the scheduler's engine-event forwarder stays alive
    engine_tx: mpsc::UnboundedSender<EngineEvent>,
}

async fn setup_with_engine(engine: Arc<dyn PlaybackEngine>, bridge: Option<Arc<BridgeEngine>>) -> TestServer {
    let store = Arc::new(MemoryStore::new());
    let event_bus = EventBus::new(64);
    let state = Arc::new(SharedState::new(event_bus.clone()));
    let playlist = Arc::new(Playlist::new(store.clone(), event_bus));
    let visibility = VisibilitySignal::new();

    let (engine_tx, engine_rx) = mpsc::unbounded_channel();
    let engine_name = engine.name();
    let deps = SchedulerDeps {
        engine,
        playlist: playlist.clone(),
        store,
        clock: Arc::new(SystemClock),
        state: state.clone(),
    };
    let (scheduler, _task) = PlaybackScheduler::spawn(deps, test_config(PlaybackMode::Loop), engine_rx, &visibility);

    let ctx = AppContext {
        state,
        scheduler,
        playlist,
        visibility,
        bridge,
        engine_name,
    };
    TestServer {
        app: build_router(ctx.clone()),
        ctx,
        engine_tx,
    }
}

/// Test helper to create a server over a recording engine
async fn setup_test_server() -> (TestServer, Arc<RecordingEngine>) {
    let engine = RecordingEngine::new();
    let server = setup_with_engine(engine.clone(), None).await;
    (server, engine)
}

/// Helper function to make HTTP requests to the test server
async fn make_request(app: &axum::Router, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Option<Value>) {
    let request = Request::builder().method(method).uri(path);
    let request = match body {
        Some(json_body) => request
            .header("content-type", "application/json")
            .body(Body::from(json_body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    let json_body = if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&bytes).unwrap())
    };
    (status, json_body)
}

/// Poll the published status until `check` holds
async fn wait_for_status(ctx: &AppContext, check: impl Fn(&segloop_player::state::PlaybackStatus) -> bool) {
    for _ in 0..200 {
        if check(&ctx.state.status().await) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("status never matched: {:?}", ctx.state.status().await);
}

async fn add_entry(app: &axum::Router, body: Value) -> Uuid {
    let (status, body) = make_request(app, Method::POST, "/playlist/entries", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    serde_json::from_value(body.unwrap()["id"].clone()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _) = setup_test_server().await;

    let (status, body) = make_request(&server.app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.expect("Expected response body");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "segloop-player");
    assert_eq!(body["engine"], "recording");
    assert!(body["version"].is_string());
    assert!(body["git_hash"].is_string());
}

#[tokio::test]
async fn test_playback_state_starts_idle() {
    let (server, _) = setup_test_server().await;
    wait_for_status(&server.ctx, |s| s.timer_backend.is_some()).await;

    let (status, body) = make_request(&server.app, Method::GET, "/playback/state", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["state"], "idle");
    assert_eq!(body["mode"], "loop");
    assert_eq!(body["timer_backend"], "local_timeout");
    assert_eq!(body["failures"]["stale_signal"], 0);
}

#[tokio::test]
async fn test_add_entry_accepts_seconds_and_time_strings() {
    let (server, _) = setup_test_server().await;

    let (status, body) = make_request(
        &server.app,
        Method::POST,
        "/playlist/entries",
        Some(json!({"source_id": "dQw4w9WgXcQ", "start": 10, "end": "1:05"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let body = body.unwrap();
    assert_eq!(body["start_offset_seconds"], 10.0);
    assert_eq!(body["end_offset_seconds"], 65.0);
    assert_eq!(body["start"], "0:10");
    assert_eq!(body["end"], "1:05");
    assert_eq!(body["failed"], false);

    let (status, body) = make_request(&server.app, Method::GET, "/playlist", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.unwrap()["entries"].as_array().unwrap().clone();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["source_id"], "dQw4w9WgXcQ");
}

#[tokio::test]
async fn test_add_entry_rejects_bad_offsets() {
    let (server, _) = setup_test_server().await;

    for bad in [
        json!({"source_id": "v", "start": 20, "end": 10}),
        json!({"source_id": "v", "start": "soon"}),
        json!({"source_id": "v", "end": -3}),
        json!({"source_id": "  "}),
        json!({"source_id": "v", "end": 1e20}),
        json!({"source_id": "v", "end": "99999999999999999999999"}),
    ] {
        let (status, body) = make_request(&server.app, Method::POST, "/playlist/entries", Some(bad.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}", bad);
        assert!(body.unwrap()["error"].is_string());
    }

    assert!(server.ctx.playlist.is_empty().await);
}

#[tokio::test]
async fn test_update_and_remove_entry() {
    let (server, _) = setup_test_server().await;
    let id = add_entry(&server.app, json!({"source_id": "v", "start": 5, "end": 15})).await;

    let (status, body) = make_request(
        &server.app,
        Method::PUT,
        &format!("/playlist/entries/{}", id),
        Some(json!({"start": "0:05", "end": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["end_offset_seconds"], 30.0);

    let (status, _) = make_request(
        &server.app,
        Method::PUT,
        &format!("/playlist/entries/{}", id),
        Some(json!({"start": 40, "end": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = make_request(
        &server.app,
        Method::PUT,
        &format!("/playlist/entries/{}", Uuid::new_v4()),
        Some(json!({"end": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = make_request(&server.app, Method::DELETE, &format!("/playlist/entries/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_none());

    let (status, _) = make_request(&server.app, Method::DELETE, &format!("/playlist/entries/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_select_loads_entry() {
    let (server, engine) = setup_test_server().await;
    let id = add_entry(&server.app, json!({"source_id": "clip", "start": 12, "end": 20})).await;

    let (status, _) = make_request(&server.app, Method::POST, &format!("/playback/select/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = make_request(&server.app, Method::POST, &format!("/playback/select/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "ok");

    wait_for_status(&server.ctx, |s| s.state == EngineState::Loading).await;
    assert_eq!(engine.loads(), vec![("clip".to_string(), 12.0)]);

    let (_, body) = make_request(&server.app, Method::GET, "/playlist", None).await;
    assert_eq!(body.unwrap()["current_id"], json!(id));
}

#[tokio::test]
async fn test_pause_and_play_commands() {
    let (server, engine) = setup_test_server().await;
    let id = add_entry(&server.app, json!({"source_id": "clip", "end": 600})).await;
    make_request(&server.app, Method::POST, &format!("/playback/select/{}", id), None).await;
    server.engine_tx.send(EngineEvent::Playing).unwrap();
    wait_for_status(&server.ctx, |s| s.state == EngineState::Playing).await;

    let (status, _) = make_request(&server.app, Method::POST, "/playback/pause", None).await;
    assert_eq!(status, StatusCode::OK);
    wait_for_status(&server.ctx, |s| s.state == EngineState::Paused && s.paused_by_user).await;

    let (status, _) = make_request(&server.app, Method::POST, "/playback/play", None).await;
    assert_eq!(status, StatusCode::OK);
    wait_for_status(&server.ctx, |s| s.state == EngineState::Playing).await;

    let (status, _) = make_request(&server.app, Method::POST, "/playback/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    wait_for_status(&server.ctx, |s| s.state == EngineState::Idle).await;

    let commands = engine.commands();
    assert!(commands.contains(&segloop_player::engine::EngineCommand::Pause));
    assert!(commands.contains(&segloop_player::engine::EngineCommand::Play));
}

#[tokio::test]
async fn test_next_and_mode() {
    let (server, engine) = setup_test_server().await;
    add_entry(&server.app, json!({"source_id": "a"})).await;
    add_entry(&server.app, json!({"source_id": "b"})).await;

    let (status, _) = make_request(&server.app, Method::POST, "/playback/mode", Some(json!({"mode": "advance"}))).await;
    assert_eq!(status, StatusCode::OK);
    wait_for_status(&server.ctx, |s| s.mode == PlaybackMode::Advance).await;

    make_request(&server.app, Method::POST, "/playback/next", None).await;
    wait_for_status(&server.ctx, |s| s.segment.as_ref().map(|seg| seg.source_id.as_str()) == Some("a")).await;
    make_request(&server.app, Method::POST, "/playback/next", None).await;
    wait_for_status(&server.ctx, |s| s.segment.as_ref().map(|seg| seg.source_id.as_str()) == Some("b")).await;
    assert_eq!(engine.loads_of("b"), 1);

    let (status, _) = make_request(&server.app, Method::POST, "/playback/mode", Some(json!({"mode": "shuffle"}))).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_visibility_report() {
    let (server, _) = setup_test_server().await;
    assert!(server.ctx.visibility.is_visible());

    let (status, _) = make_request(&server.app, Method::POST, "/visibility", Some(json!({"visible": false}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!server.ctx.visibility.is_visible());
    wait_for_status(&server.ctx, |s| !s.visible).await;
}

#[tokio::test]
async fn test_event_stream_is_sse() {
    let (server, _) = setup_test_server().await;

    let request = Request::builder().uri("/events").body(Body::empty()).unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
}

#[tokio::test]
async fn test_embed_endpoints_need_bridge() {
    let (server, _) = setup_test_server().await;

    let request = Request::builder().uri("/embed/commands").body(Body::empty()).unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (status, _) = make_request(&server.app, Method::POST, "/embed/report", Some(json!({"event": "playing"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_embed_bridge_round_trip() {
    let (bridge_tx, bridge_rx) = mpsc::unbounded_channel();
    let bridge = Arc::new(BridgeEngine::new(bridge_tx, 16));
    let server = setup_with_engine(bridge.clone(), Some(bridge.clone())).await;
    // Route the bridge's reports into the scheduler's engine channel
    let forward = server.engine_tx.clone();
    tokio::spawn(async move {
        let mut rx = bridge_rx;
        while let Some(event) = rx.recv().await {
            if forward.send(event).is_err() {
                break;
            }
        }
    });

    // Embed page connects
    let request = Request::builder().uri("/embed/commands").body(Body::empty()).unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(bridge.connected_clients(), 1);
    let mut commands = response.into_body();

    let id = add_entry(&server.app, json!({"source_id": "clip", "start": 30, "end": 45})).await;
    make_request(&server.app, Method::POST, &format!("/playback/select/{}", id), None).await;

    let frame = tokio::time::timeout(Duration::from_secs(2), commands.frame())
        .await
        .expect("command frame")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: command"), "{}", text);
    assert!(text.contains(r#""command":"load""#), "{}", text);
    assert!(text.contains(r#""source_id":"clip""#), "{}", text);

    let (status, _) = make_request(
        &server.app,
        Method::POST,
        "/embed/report",
        Some(json!({"event": "playing", "position": 31.5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    wait_for_status(&server.ctx, |s| s.state == EngineState::Playing).await;
    assert!(bridge.current_position().unwrap() >= 31.5);
}
