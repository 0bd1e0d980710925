//! Shared player state
//!
//! The scheduler task is the only writer; HTTP handlers and SSE streams read.
//! Failure counters are atomics so they can be bumped without awaiting.

use crate::scheduler::FailureKind;
use segloop_common::events::{EventBus, SegloopEvent, TimerBackendKind};
use segloop_common::models::Generation;
use segloop_common::{EngineState, PlaybackMode, Segment};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, RwLock};

/// Snapshot of the scheduler, as served by `GET /playback/state`
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackStatus {
    pub state: EngineState,
    pub paused_by_user: bool,
    pub mode: PlaybackMode,
    pub segment: Option<Segment>,
    pub generation: Generation,
    pub position_seconds: Option<f64>,
    pub consecutive_failures: u32,
    pub timer_backend: Option<TimerBackendKind>,
    pub visible: bool,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            state: EngineState::Idle,
            paused_by_user: false,
            mode: PlaybackMode::Loop,
            segment: None,
            generation: 0,
            position_seconds: None,
            consecutive_failures: 0,
            timer_backend: None,
            visible: true,
        }
    }
}

/// Per-kind failure totals since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounts {
    pub transient_engine_error: u64,
    pub stale_signal: u64,
    pub persistence_corrupt: u64,
    pub permanent_playback_failure: u64,
}

/// Shared state accessible by all components
pub struct SharedState {
    status: RwLock<PlaybackStatus>,
    event_bus: EventBus,
    transient_engine_errors: AtomicU64,
    stale_signals: AtomicU64,
    persistence_corrupt: AtomicU64,
    permanent_failures: AtomicU64,
}

impl SharedState {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            status: RwLock::new(PlaybackStatus::default()),
            event_bus,
            transient_engine_errors: AtomicU64::new(0),
            stale_signals: AtomicU64::new(0),
            persistence_corrupt: AtomicU64::new(0),
            permanent_failures: AtomicU64::new(0),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: SegloopEvent) {
        self.event_bus.emit_lossy(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<SegloopEvent> {
        self.event_bus.subscribe()
    }

    pub async fn status(&self) -> PlaybackStatus {
        self.status.read().await.clone()
    }

    pub async fn set_status(&self, status: PlaybackStatus) {
        *self.status.write().await = status;
    }

    pub fn record_failure(&self, kind: FailureKind) {
        let counter = match kind {
            FailureKind::TransientEngineError => &self.transient_engine_errors,
            FailureKind::StaleSignal => &self.stale_signals,
            FailureKind::PersistenceCorrupt => &self.persistence_corrupt,
            FailureKind::PermanentPlaybackFailure => &self.permanent_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_counts(&self) -> FailureCounts {
        FailureCounts {
            transient_engine_error: self.transient_engine_errors.load(Ordering::Relaxed),
            stale_signal: self.stale_signals.load(Ordering::Relaxed),
            persistence_corrupt: self.persistence_corrupt.load(Ordering::Relaxed),
            permanent_playback_failure: self.permanent_failures.load(Ordering::Relaxed),
        }
    }
}
