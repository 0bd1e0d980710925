//! Scheduler harness
//!
//! Drives a `PlaybackScheduler` by hand: the test calls `handle` directly and
//! pumps whatever the scheduler's own timers, monitor and retries queued.
//! Wall-clock time comes from a `ManualClock`; tokio time should be paused
//! (`start_paused = true`) so timers only fire when the test advances it.

use super::RecordingEngine;
use chrono::Utc;
use segloop_common::db::MemoryStore;
use segloop_common::events::{EventBus, SegloopEvent};
use segloop_common::time::ManualClock;
use segloop_common::{EngineState, PlaybackMode, Segment};
use segloop_player::engine::EngineEvent;
use segloop_player::playlist::{Playlist, PlaylistChange};
use segloop_player::scheduler::{
    scheduler_channel, BoundarySignal, PlaybackScheduler, SchedulerConfig, SchedulerDeps, SchedulerInput,
    SchedulerReceiver, UserCommand,
};
use segloop_player::state::SharedState;
use segloop_player::timers::TimerOptions;
use segloop_common::events::BoundarySource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};

pub struct Harness {
    pub scheduler: PlaybackScheduler,
    pub rx: SchedulerReceiver,
    pub engine: Arc<RecordingEngine>,
    pub playlist: Arc<Playlist>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub state: Arc<SharedState>,
    changes: broadcast::Receiver<PlaylistChange>,
}

/// Local timeouts only, 1 s polling, 3 s backoff, 3 attempts
pub fn test_config(mode: PlaybackMode) -> SchedulerConfig {
    SchedulerConfig {
        poll_interval: Duration::from_secs(1),
        retry_backoff: Duration::from_secs(3),
        max_consecutive_failures: 3,
        timers: TimerOptions::local_only(),
        mode,
    }
}

impl Harness {
    pub async fn new(mode: PlaybackMode) -> Self {
        Self::with_store(test_config(mode), Arc::new(MemoryStore::new())).await
    }

    /// Build on an existing store (restored playlist, leftover records)
    pub async fn with_store(config: SchedulerConfig, store: Arc<MemoryStore>) -> Self {
        let event_bus = EventBus::new(256);
        let state = Arc::new(SharedState::new(event_bus.clone()));
        let playlist = Arc::new(Playlist::restore(store.clone(), event_bus).await);
        let changes = playlist.subscribe();
        let engine = RecordingEngine::new();
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let (tx, rx) = scheduler_channel();
        let deps = SchedulerDeps {
            engine: engine.clone(),
            playlist: playlist.clone(),
            store: store.clone(),
            clock: clock.clone(),
            state: state.clone(),
        };
        let scheduler = PlaybackScheduler::new(deps, config, tx);

        Self {
            scheduler,
            rx,
            engine,
            playlist,
            store,
            clock,
            state,
            changes,
        }
    }

    /// Append a playlist entry
    pub async fn add(&mut self, source_id: &str, start: Option<f64>, end: Option<f64>) -> Segment {
        let segment = Segment::new(source_id, start, end).unwrap();
        self.playlist.add(segment.clone()).await.unwrap();
        self.drain().await;
        segment
    }

    pub async fn user(&mut self, command: UserCommand) {
        self.scheduler.handle(SchedulerInput::User(command)).await;
        self.drain().await;
    }

    pub async fn engine_event(&mut self, event: EngineEvent) {
        self.scheduler.handle(SchedulerInput::Engine(event)).await;
        self.drain().await;
    }

    pub async fn input(&mut self, input: SchedulerInput) {
        self.scheduler.handle(input).await;
        self.drain().await;
    }

    /// Select `segment` and confirm playback from the engine
    pub async fn start(&mut self, segment: &Segment) {
        self.user(UserCommand::Select(segment.id)).await;
        self.engine_event(EngineEvent::Playing).await;
    }

    /// Boundary signal for the live (segment, generation)
    pub fn live_signal(&self, source: BoundarySource) -> BoundarySignal {
        let session = self.scheduler.session();
        BoundarySignal {
            segment_id: session.segment_id().unwrap(),
            generation: session.generation,
            source,
        }
    }

    /// Handle every queued input, including playlist changes
    pub async fn drain(&mut self) {
        loop {
            // Let spawned monitor and timer tasks run
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
            let mut handled = false;
            loop {
                let change = match self.changes.try_recv() {
                    Ok(change) => change,
                    // Same recovery as the live forwarder
                    Err(TryRecvError::Lagged(_)) => PlaylistChange::Resync,
                    Err(_) => break,
                };
                self.scheduler.handle(SchedulerInput::Playlist(change)).await;
                handled = true;
            }
            while let Ok(input) = self.rx.try_recv() {
                self.scheduler.handle(input).await;
                handled = true;
            }
            if !handled {
                break;
            }
        }
    }

    /// Let tokio time pass, then handle what it produced
    pub async fn advance(&mut self, by: Duration) {
        tokio::time::sleep(by).await;
        self.drain().await;
    }

    pub fn engine_state(&self) -> EngineState {
        self.scheduler.session().engine_state
    }

    pub fn generation(&self) -> u64 {
        self.scheduler.session().generation
    }
}

/// Collect every event currently buffered on a subscription
pub fn drain_events(rx: &mut broadcast::Receiver<SegloopEvent>) -> Vec<SegloopEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
