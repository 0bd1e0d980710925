//! Scheduler task
//!
//! Owns the session and every arming mechanism. Nothing here returns an
//! error to the caller: failures are logged, counted by [`FailureKind`] and
//! turned into retries or state changes.

use super::{
    scheduler_channel, BoundarySignal, FailureKind, PlaybackSession, SchedulerConfig, SchedulerHandle,
    SchedulerInput, SchedulerReceiver, SchedulerSender, UserCommand,
};
use crate::engine::{EngineEvent, PlaybackEngine};
use crate::monitor::SegmentMonitor;
use crate::playlist::{Playlist, PlaylistChange};
use crate::reconciler::{ReconcileOutcome, VisibilityReconciler};
use crate::state::{PlaybackStatus, SharedState};
use crate::timers::BackgroundTimerFacade;
use crate::visibility::VisibilitySignal;
use segloop_common::db::KeyValueStore;
use segloop_common::events::{BoundarySource, SegloopEvent};
use segloop_common::models::Generation;
use segloop_common::time::{self, WallClock};
use segloop_common::{EngineState, PlaybackMode, Segment, SegmentId};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Slack added to the poll interval when deciding whether an end-of-media
/// report predates the last loop seek
const STALE_END_SLACK_SECONDS: f64 = 0.5;

/// Collaborators the scheduler drives
#[derive(Clone)]
pub struct SchedulerDeps {
    pub engine: Arc<dyn PlaybackEngine>,
    pub playlist: Arc<Playlist>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn WallClock>,
    pub state: Arc<SharedState>,
}

pub struct PlaybackScheduler {
    config: SchedulerConfig,
    engine: Arc<dyn PlaybackEngine>,
    playlist: Arc<Playlist>,
    state: Arc<SharedState>,
    reconciler: VisibilityReconciler,
    timers: BackgroundTimerFacade,
    monitor: SegmentMonitor,
    session: PlaybackSession,
    mode: PlaybackMode,
    visible: bool,
    last_generation: Generation,
    retry_task: Option<JoinHandle<()>>,
    tx: SchedulerSender,
}

impl PlaybackScheduler {
    /// Build a scheduler whose timers, monitor and retries report on `tx`
    pub fn new(deps: SchedulerDeps, config: SchedulerConfig, tx: SchedulerSender) -> Self {
        let timers = BackgroundTimerFacade::new(&config.timers, tx.clone(), Arc::clone(&deps.clock));
        Self::with_timers(deps, config, timers, tx)
    }

    /// Build with a prepared timer facade
    pub fn with_timers(
        deps: SchedulerDeps,
        config: SchedulerConfig,
        timers: BackgroundTimerFacade,
        tx: SchedulerSender,
    ) -> Self {
        let reconciler = VisibilityReconciler::new(deps.store, deps.clock, Arc::clone(&deps.state));
        Self {
            monitor: SegmentMonitor::new(config.poll_interval),
            mode: config.mode,
            config,
            engine: deps.engine,
            playlist: deps.playlist,
            state: deps.state,
            reconciler,
            timers,
            session: PlaybackSession::default(),
            visible: true,
            last_generation: 0,
            retry_task: None,
            tx,
        }
    }

    /// Wire the input channel, start forwarders and run the scheduler task
    pub fn spawn(
        deps: SchedulerDeps,
        config: SchedulerConfig,
        engine_events: mpsc::UnboundedReceiver<EngineEvent>,
        visibility: &VisibilitySignal,
    ) -> (SchedulerHandle, JoinHandle<()>) {
        let (tx, rx) = scheduler_channel();

        tokio::spawn(forward_engine_events(engine_events, tx.clone()));
        tokio::spawn(forward_playlist_changes(deps.playlist.subscribe(), tx.clone()));
        visibility.forward_to(tx.clone());

        let scheduler = Self::new(deps, config, tx.clone());
        let task = tokio::spawn(scheduler.run(rx));
        (SchedulerHandle::new(tx), task)
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn timers(&self) -> &BackgroundTimerFacade {
        &self.timers
    }

    pub fn monitor(&self) -> &SegmentMonitor {
        &self.monitor
    }

    /// Run until `Shutdown`
    pub async fn run(mut self, mut rx: SchedulerReceiver) {
        self.startup().await;

        while let Some(input) = rx.recv().await {
            let stop = matches!(input, SchedulerInput::Shutdown);
            self.handle(input).await;
            if stop {
                break;
            }
        }

        info!("Scheduler stopped");
    }

    /// Reconcile the persisted record against the restored playlist cursor
    ///
    /// Playback stays idle; a boundary that passed while the process was
    /// down only moves the cursor in advance mode.
    pub async fn startup(&mut self) {
        let cursor = self.playlist.current_id().await;

        if let ReconcileOutcome::Due(record) = self.reconciler.reconcile(cursor).await {
            if self.mode == PlaybackMode::Advance {
                if let Some(next) = self.playlist.next_entry(record.segment_id).await {
                    info!("Boundary of {} passed while stopped, cursor moves to {}", record.segment_id, next.id);
                    if let Err(e) = self.playlist.set_current(Some(next.id)).await {
                        warn!("Failed to move playlist cursor: {}", e);
                    }
                }
            }
        }

        info!(
            "Scheduler ready: mode {}, {} timers, engine {}",
            self.mode,
            self.timers.backend(),
            self.engine.name()
        );
        self.publish().await;
    }

    /// Process one input
    pub async fn handle(&mut self, input: SchedulerInput) {
        match input {
            SchedulerInput::User(command) => self.on_user(command).await,
            SchedulerInput::Engine(event) => self.on_engine(event).await,
            SchedulerInput::Boundary(signal) => self.on_boundary(signal).await,
            SchedulerInput::PositionSampled {
                segment_id,
                generation,
                position,
            } => self.on_position(segment_id, generation, position),
            SchedulerInput::TimerFired(handle) => {
                if self.session.timer == Some(handle) {
                    self.session.timer = None;
                }
                match self.timers.on_fired(handle) {
                    Some(signal) => self.on_boundary(signal).await,
                    None => {
                        debug!("Ignoring completion of disarmed timer {:?}", handle);
                        self.state.record_failure(FailureKind::StaleSignal);
                    }
                }
            }
            SchedulerInput::Heartbeat(at) => {
                for signal in self.timers.on_heartbeat(at) {
                    self.session.timer = None;
                    self.on_boundary(signal).await;
                }
            }
            SchedulerInput::RetryLoad { segment_id, generation } => self.on_retry(segment_id, generation),
            SchedulerInput::Visibility(visible) => self.on_visibility(visible).await,
            SchedulerInput::Playlist(change) => self.on_playlist(change).await,
            SchedulerInput::Shutdown => self.shutdown().await,
        }

        self.publish().await;
    }

    async fn on_user(&mut self, command: UserCommand) {
        debug!("User command {:?} in state {}", command, self.session.engine_state);

        match command {
            UserCommand::Select(id) => match self.playlist.get(id).await {
                Some(entry) => {
                    if entry.failed {
                        self.playlist.set_failed(id, false).await;
                    }
                    self.load_segment(entry.segment).await;
                }
                None => warn!("Cannot select unknown entry {}", id),
            },

            UserCommand::Play => match self.session.engine_state {
                EngineState::Idle => match self.first_playable().await {
                    Some(segment) => self.load_segment(segment).await,
                    None => info!("Nothing to play"),
                },
                EngineState::Paused => self.resume().await,
                EngineState::Loading | EngineState::Playing => {}
            },

            UserCommand::Pause => match self.session.engine_state {
                EngineState::Playing | EngineState::Loading => {
                    if let Err(e) = self.engine.pause() {
                        warn!("Pause command failed: {}", e);
                        self.state.record_failure(FailureKind::TransientEngineError);
                    }
                    self.teardown_arming();
                    self.cancel_retry();
                    self.reconciler.clear().await;
                    self.session.paused_by_user = true;
                    self.transition(EngineState::Paused);
                }
                EngineState::Paused => self.session.paused_by_user = true,
                EngineState::Idle => {}
            },

            UserCommand::Next => {
                let from = match self.session.segment_id() {
                    Some(id) => Some(id),
                    None => self.playlist.current_id().await,
                };
                match from {
                    Some(id) => {
                        self.session.mark_acted();
                        self.advance(id).await;
                    }
                    None => match self.first_playable().await {
                        Some(segment) => self.load_segment(segment).await,
                        None => info!("Nothing to play"),
                    },
                }
            }

            UserCommand::Stop => {
                if self.session.engine_state != EngineState::Idle {
                    if let Err(e) = self.engine.pause() {
                        debug!("Pause on stop failed: {}", e);
                    }
                }
                self.stop_to_idle().await;
            }

            UserCommand::SetMode(mode) => {
                if mode != self.mode {
                    info!("Boundary mode: {} -> {}", self.mode, mode);
                    self.mode = mode;
                    self.emit(SegloopEvent::ModeChanged {
                        mode,
                        timestamp: time::now(),
                    });
                }
            }
        }
    }

    async fn on_engine(&mut self, event: EngineEvent) {
        let current = self.session.engine_state;
        debug!("Engine event {:?} in state {}", event, current);

        match event {
            EngineEvent::Playing => match current {
                EngineState::Loading | EngineState::Paused => {
                    if current == EngineState::Loading {
                        self.session.consecutive_failures = 0;
                        self.session.last_error = None;
                    }
                    self.session.paused_by_user = false;
                    self.transition(EngineState::Playing);
                    let position = self.position_estimate();
                    self.arm(position).await;
                }
                EngineState::Playing => {}
                EngineState::Idle => debug!("Engine playing while idle; ignored"),
            },

            EngineEvent::Paused => {
                if matches!(current, EngineState::Playing | EngineState::Loading) {
                    self.teardown_arming();
                    self.reconciler.clear().await;
                    self.session.paused_by_user = false;
                    self.transition(EngineState::Paused);
                }
            }

            EngineEvent::Ended => {
                if matches!(current, EngineState::Playing | EngineState::Paused) {
                    let position = self.position_estimate();
                    if self.session.ended_before_restart(position, self.stale_end_window()) {
                        debug!("End of media at {:.3}s predates the loop restart; ignored", position);
                        self.state.record_failure(FailureKind::StaleSignal);
                        return;
                    }
                    if let Some(segment_id) = self.session.segment_id() {
                        self.session.mark_acted();
                        self.emit(SegloopEvent::BoundaryReached {
                            segment_id,
                            generation: self.session.generation,
                            source: BoundarySource::Ended,
                            timestamp: time::now(),
                        });
                        self.apply_boundary_action(segment_id, BoundarySource::Ended).await;
                    }
                } else {
                    debug!("End of media in state {}; ignored", current);
                }
            }

            EngineEvent::Error { code } => {
                if self.session.segment.is_none() {
                    warn!("Engine error {} while idle", code);
                    self.state.record_failure(FailureKind::TransientEngineError);
                    return;
                }
                warn!(
                    "Engine error {} on segment {:?} (gen {})",
                    code,
                    self.session.segment_id(),
                    self.session.generation
                );
                self.register_failure(format!("engine error code {}", code));
            }
        }
    }

    async fn on_boundary(&mut self, signal: BoundarySignal) {
        if !self.session.is_current(signal.segment_id, signal.generation) || self.session.already_acted() {
            debug!(
                "Stale {} signal for {} gen {}",
                signal.source, signal.segment_id, signal.generation
            );
            self.state.record_failure(FailureKind::StaleSignal);
            return;
        }

        if signal.source == BoundarySource::Failure {
            self.session.mark_acted();
            self.on_permanent_failure().await;
            return;
        }

        match (self.session.engine_state, self.session.paused_by_user) {
            (EngineState::Playing, _) | (EngineState::Paused, false) => {}
            (state, paused_by_user) => {
                debug!(
                    "Discarding {} signal in state {} (paused by user: {})",
                    signal.source, state, paused_by_user
                );
                self.state.record_failure(FailureKind::StaleSignal);
                return;
            }
        }

        info!(
            "Boundary of {} gen {} reached ({})",
            signal.segment_id, signal.generation, signal.source
        );
        self.session.mark_acted();
        self.emit(SegloopEvent::BoundaryReached {
            segment_id: signal.segment_id,
            generation: signal.generation,
            source: signal.source,
            timestamp: time::now(),
        });
        self.apply_boundary_action(signal.segment_id, signal.source).await;
    }

    fn on_position(&mut self, segment_id: SegmentId, generation: Generation, position: f64) {
        if !self.session.is_current(segment_id, generation) || self.session.engine_state != EngineState::Playing {
            return;
        }
        self.session.last_known_position = Some(position);
        if let Some(start) = self.session.restarted_at {
            if position >= start + self.stale_end_window() {
                self.session.restarted_at = None;
            }
        }
        self.emit(SegloopEvent::PlaybackProgress {
            segment_id,
            position_seconds: position,
            end_offset_seconds: self.session.segment.as_ref().and_then(|s| s.end_offset_seconds),
            timestamp: time::now(),
        });
    }

    fn on_retry(&mut self, segment_id: SegmentId, generation: Generation) {
        self.retry_task = None;
        if !self.session.is_current(segment_id, generation) || self.session.engine_state != EngineState::Loading {
            debug!("Dropping retry for {} gen {}", segment_id, generation);
            return;
        }
        info!(
            "Retrying load of {} (failure {} of {})",
            segment_id, self.session.consecutive_failures, self.config.max_consecutive_failures
        );
        self.start_load();
    }

    async fn on_visibility(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;

        if !visible {
            self.refresh_record().await;
            return;
        }

        let live = self.session.segment_id();
        if let ReconcileOutcome::Due(record) = self.reconciler.reconcile(live).await {
            self.on_boundary(BoundarySignal {
                segment_id: record.segment_id,
                generation: self.session.generation,
                source: BoundarySource::Reconciler,
            })
            .await;
        }
    }

    async fn on_playlist(&mut self, change: PlaylistChange) {
        match change {
            PlaylistChange::Updated(segment) if self.session.segment_id() == Some(segment.id) => {
                self.adopt_offsets(segment).await;
            }
            PlaylistChange::Removed(id) if self.session.segment_id() == Some(id) => {
                self.drop_live_segment(id).await;
            }
            PlaylistChange::Resync => {
                let Some(id) = self.session.segment_id() else {
                    return;
                };
                match self.playlist.get(id).await {
                    Some(entry) if self.session.segment.as_ref() != Some(&entry.segment) => {
                        self.adopt_offsets(entry.segment).await;
                    }
                    Some(_) => debug!("Live segment unchanged after resync"),
                    None => self.drop_live_segment(id).await,
                }
            }
            _ => {}
        }
    }

    async fn adopt_offsets(&mut self, segment: Segment) {
        info!("Offsets of the live segment changed");
        self.session.segment = Some(segment);
        if self.session.engine_state == EngineState::Playing {
            let position = self.position_estimate();
            self.arm(position).await;
        }
    }

    async fn drop_live_segment(&mut self, id: SegmentId) {
        info!("Live segment {} was removed from the playlist", id);
        if let Err(e) = self.engine.pause() {
            debug!("Pause after removal failed: {}", e);
        }
        self.stop_to_idle().await;
    }

    async fn shutdown(&mut self) {
        info!("Scheduler shutting down");
        self.refresh_record().await;
        self.teardown_arming();
        self.cancel_retry();
    }

    /// Loop back or move on, depending on the mode
    async fn apply_boundary_action(&mut self, segment_id: SegmentId, source: BoundarySource) {
        match self.mode {
            // An engine that reached the end of media has stopped on its own
            PlaybackMode::Loop => self.loop_restart(source == BoundarySource::Ended).await,
            PlaybackMode::Advance => self.advance(segment_id).await,
        }
    }

    async fn loop_restart(&mut self, engine_stopped: bool) {
        let Some(segment) = self.session.segment.clone() else {
            return;
        };
        let start = segment.loop_start();
        self.teardown_arming();

        debug!(
            "Looping {} back to {:.3}s (pass of {:?}s)",
            segment.id,
            start,
            segment.span()
        );
        if let Err(e) = self.engine.seek(start, true) {
            warn!("Seek to loop start failed: {}", e);
            self.register_failure(e.to_string());
            return;
        }
        if engine_stopped || self.session.engine_state == EngineState::Paused {
            if let Err(e) = self.engine.play() {
                warn!("Play after loop seek failed: {}", e);
                self.state.record_failure(FailureKind::TransientEngineError);
            }
        }

        self.session.generation = self.next_generation();
        self.session.paused_by_user = false;
        self.session.last_known_position = Some(start);
        self.session.restarted_at = Some(start);
        self.transition(EngineState::Playing);
        self.emit(SegloopEvent::SegmentLooped {
            segment_id: segment.id,
            generation: self.session.generation,
            start_seconds: start,
            timestamp: time::now(),
        });
        self.arm(start).await;
    }

    async fn advance(&mut self, from: SegmentId) {
        match self.playlist.next_entry(from).await {
            Some(next) => {
                info!("Advancing from {} to {}", from, next.id);
                self.emit(SegloopEvent::SegmentAdvanced {
                    from_segment_id: from,
                    to_segment_id: next.id,
                    timestamp: time::now(),
                });
                self.load_segment(next).await;
            }
            None => {
                warn!("No playable entry after {}", from);
                self.stop_to_idle().await;
            }
        }
    }

    async fn on_permanent_failure(&mut self) {
        let Some(segment) = self.session.segment.clone() else {
            return;
        };
        let attempts = self.session.consecutive_failures;
        let last_error = self.session.last_error.clone().unwrap_or_default();

        error!(
            "Segment {} failed permanently after {} attempts: {}",
            segment.id, attempts, last_error
        );
        self.state.record_failure(FailureKind::PermanentPlaybackFailure);
        self.playlist.set_failed(segment.id, true).await;
        self.emit(SegloopEvent::SegmentFailed {
            segment_id: segment.id,
            attempts,
            last_error,
            timestamp: time::now(),
        });

        match self.mode {
            PlaybackMode::Advance => self.advance(segment.id).await,
            PlaybackMode::Loop => self.stop_to_idle().await,
        }
    }

    /// Make `segment` current and issue a load
    async fn load_segment(&mut self, segment: Segment) {
        self.teardown_arming();
        self.cancel_retry();
        self.reconciler.clear().await;

        if self.session.segment_id() == Some(segment.id) {
            self.session.segment = Some(segment.clone());
        } else {
            let state = self.session.engine_state;
            self.session = PlaybackSession::for_segment(segment.clone());
            self.session.engine_state = state;
        }
        self.session.paused_by_user = false;

        if let Err(e) = self.playlist.set_current(Some(segment.id)).await {
            warn!("Failed to move playlist cursor: {}", e);
        }
        self.start_load();
    }

    /// Issue `load` for the session's segment under a new generation
    fn start_load(&mut self) {
        let Some(segment) = self.session.segment.clone() else {
            return;
        };
        let start = segment.loop_start();

        self.session.generation = self.next_generation();
        self.session.last_known_position = None;
        self.session.restarted_at = None;
        self.transition(EngineState::Loading);

        info!(
            "Loading {} ({}) at {:.3}s, gen {}",
            segment.id, segment.source_id, start, self.session.generation
        );
        self.emit(SegloopEvent::SegmentStarted {
            segment_id: segment.id,
            source_id: segment.source_id.clone(),
            generation: self.session.generation,
            timestamp: time::now(),
        });

        if let Err(e) = self.engine.load(&segment.source_id, start) {
            warn!("Load command failed: {}", e);
            self.register_failure(e.to_string());
        }
    }

    async fn resume(&mut self) {
        if let Err(e) = self.engine.play() {
            warn!("Play command failed: {}", e);
            self.state.record_failure(FailureKind::TransientEngineError);
        }
        self.session.paused_by_user = false;
        self.transition(EngineState::Playing);
        let position = self.position_estimate();
        self.arm(position).await;
    }

    async fn stop_to_idle(&mut self) {
        self.teardown_arming();
        self.cancel_retry();
        self.reconciler.clear().await;
        self.session.paused_by_user = false;
        self.transition(EngineState::Idle);
        self.session = PlaybackSession::default();
    }

    /// Count a transient failure and either retry or give up
    fn register_failure(&mut self, message: String) {
        self.state.record_failure(FailureKind::TransientEngineError);
        self.teardown_arming();

        let Some(segment_id) = self.session.segment_id() else {
            return;
        };
        self.session.consecutive_failures += 1;
        self.session.last_error = Some(message);
        self.transition(EngineState::Loading);

        let generation = self.session.generation;
        if self.session.consecutive_failures >= self.config.max_consecutive_failures {
            // Handled on the next turn, as if the boundary was reached
            let _ = self.tx.send(SchedulerInput::Boundary(BoundarySignal {
                segment_id,
                generation,
                source: BoundarySource::Failure,
            }));
        } else {
            debug!(
                "Reloading {} in {}ms",
                segment_id,
                self.config.retry_backoff.as_millis()
            );
            self.schedule_retry(segment_id, generation);
        }
    }

    fn schedule_retry(&mut self, segment_id: SegmentId, generation: Generation) {
        self.cancel_retry();
        let tx = self.tx.clone();
        let backoff = self.config.retry_backoff;
        self.retry_task = Some(tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            let _ = tx.send(SchedulerInput::RetryLoad { segment_id, generation });
        }));
    }

    fn cancel_retry(&mut self) {
        if let Some(task) = self.retry_task.take() {
            task.abort();
        }
    }

    /// Start the monitor and, for bounded segments, a timer plus the record
    async fn arm(&mut self, position: f64) {
        let Some(segment) = self.session.segment.clone() else {
            return;
        };
        self.teardown_arming();

        let generation = self.session.generation;
        self.monitor.start(
            Arc::clone(&self.engine),
            segment.id,
            generation,
            segment.end_offset_seconds,
            self.tx.clone(),
        );

        match segment.remaining_from(position) {
            Some(remaining) => {
                self.session.timer = Some(self.timers.arm(segment.id, generation, remaining));
                self.reconciler.record_boundary(&segment, remaining).await;
            }
            None => self.reconciler.clear().await,
        }
    }

    fn teardown_arming(&mut self) {
        self.monitor.stop();
        self.timers.disarm_all();
        self.session.timer = None;
    }

    /// Rewrite the record from the freshest position estimate
    async fn refresh_record(&mut self) {
        if self.session.engine_state != EngineState::Playing {
            return;
        }
        let Some(segment) = self.session.segment.clone() else {
            return;
        };
        if let Some(remaining) = segment.remaining_from(self.position_estimate()) {
            self.reconciler.record_boundary(&segment, remaining).await;
        }
    }

    fn position_estimate(&self) -> f64 {
        self.engine
            .current_position()
            .ok()
            .or(self.session.last_known_position)
            .or_else(|| self.session.segment.as_ref().map(|s| s.loop_start()))
            .unwrap_or(0.0)
    }

    async fn first_playable(&self) -> Option<Segment> {
        if let Some(segment) = self.playlist.current_entry().await {
            return Some(segment);
        }
        self.playlist
            .entries()
            .await
            .into_iter()
            .find(|e| !e.failed)
            .map(|e| e.segment)
    }

    fn stale_end_window(&self) -> f64 {
        self.config.poll_interval.as_secs_f64() + STALE_END_SLACK_SECONDS
    }

    fn next_generation(&mut self) -> Generation {
        self.last_generation += 1;
        self.last_generation
    }

    fn transition(&mut self, new_state: EngineState) {
        let old_state = self.session.engine_state;
        self.session.engine_state = new_state;
        if old_state != new_state {
            info!("Playback state: {} -> {}", old_state, new_state);
            self.emit(SegloopEvent::PlaybackStateChanged {
                old_state,
                new_state,
                paused_by_user: self.session.paused_by_user,
                timestamp: time::now(),
            });
        }
    }

    fn emit(&self, event: SegloopEvent) {
        self.state.broadcast_event(event);
    }

    async fn publish(&self) {
        self.state
            .set_status(PlaybackStatus {
                state: self.session.engine_state,
                paused_by_user: self.session.paused_by_user,
                mode: self.mode,
                segment: self.session.segment.clone(),
                generation: self.session.generation,
                position_seconds: self.session.last_known_position,
                consecutive_failures: self.session.consecutive_failures,
                timer_backend: Some(self.timers.backend()),
                visible: self.visible,
            })
            .await;
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.cancel_retry();
    }
}

async fn forward_engine_events(mut events: mpsc::UnboundedReceiver<EngineEvent>, tx: SchedulerSender) {
    while let Some(event) = events.recv().await {
        if tx.send(SchedulerInput::Engine(event)).is_err() {
            break;
        }
    }
}

async fn forward_playlist_changes(mut changes: broadcast::Receiver<PlaylistChange>, tx: SchedulerSender) {
    loop {
        match changes.recv().await {
            Ok(change) => {
                if tx.send(SchedulerInput::Playlist(change)).is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Scheduler missed {} playlist changes, resyncing", n);
                if tx.send(SchedulerInput::Playlist(PlaylistChange::Resync)).is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
