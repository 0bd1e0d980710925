//! Simulated playback engine
//!
//! A virtual player driven by the tokio clock. Loading takes `load_delay`,
//! after which the engine reports `Playing`; reaching the media duration
//! reports `Ended`. Sources can be marked as failing to exercise the retry
//! path.

use super::{EngineEvent, EngineEventSender, PlaybackEngine, PositionAnchor};
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Error code reported for sources marked as failing
pub const SIMULATED_FAILURE_CODE: i64 = 150;

/// Simulated engine tuning
#[derive(Debug, Clone)]
pub struct SimulatedEngineConfig {
    /// Delay between `load` and the `Playing` report
    pub load_delay: Duration,
    /// Media length for sources without an explicit duration
    pub default_duration_seconds: f64,
}

impl Default for SimulatedEngineConfig {
    fn default() -> Self {
        Self {
            load_delay: Duration::from_millis(200),
            default_duration_seconds: 600.0,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    source_id: Option<String>,
    anchor: PositionAnchor,
    /// Bumped on every load so stale background tasks exit
    load_seq: u64,
    durations: HashMap<String, f64>,
    failing_sources: HashSet<String>,
}

/// Virtual playback engine
pub struct SimulatedEngine {
    state: Arc<Mutex<SimState>>,
    events: EngineEventSender,
    config: SimulatedEngineConfig,
}

impl SimulatedEngine {
    pub fn new(events: EngineEventSender, config: SimulatedEngineConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            events,
            config,
        }
    }

    /// Set the media length of a source
    pub fn set_duration(&self, source_id: &str, seconds: f64) {
        lock(&self.state).durations.insert(source_id.to_string(), seconds);
    }

    /// Make every load of `source_id` end in an error event
    pub fn fail_source(&self, source_id: &str) {
        lock(&self.state).failing_sources.insert(source_id.to_string());
    }

    pub fn heal_source(&self, source_id: &str) {
        lock(&self.state).failing_sources.remove(source_id);
    }

    /// Currently loaded source
    pub fn loaded_source(&self) -> Option<String> {
        lock(&self.state).source_id.clone()
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.state).anchor.is_advancing()
    }

    fn duration_of(&self, state: &SimState, source_id: &str) -> f64 {
        state
            .durations
            .get(source_id)
            .copied()
            .unwrap_or(self.config.default_duration_seconds)
    }

    /// Watch the loaded source and report `Ended` at the media end
    fn spawn_end_watcher(&self, seq: u64, duration: f64) {
        let state = Arc::clone(&self.state);
        let events = self.events.clone();

        tokio::spawn(async move {
            loop {
                let wait = {
                    let mut st = lock(&state);
                    if st.load_seq != seq {
                        return;
                    }
                    if !st.anchor.is_advancing() {
                        None
                    } else {
                        let position = st.anchor.estimate();
                        if position >= duration {
                            st.anchor = PositionAnchor::paused_at(duration);
                            debug!("Simulated engine reached end of media at {:.1}s", duration);
                            let _ = events.send(EngineEvent::Ended);
                            return;
                        }
                        Some(duration - position)
                    }
                };

                let sleep_for = wait
                    .map(|secs| Duration::from_secs_f64(secs.min(1.0)))
                    .unwrap_or(Duration::from_millis(250));
                tokio::time::sleep(sleep_for).await;
            }
        });
    }
}

impl PlaybackEngine for SimulatedEngine {
    fn load(&self, source_id: &str, start_seconds: f64) -> Result<()> {
        let (seq, failing, duration) = {
            let mut st = lock(&self.state);
            st.load_seq += 1;
            st.source_id = Some(source_id.to_string());
            st.anchor = PositionAnchor::paused_at(start_seconds);
            let failing = st.failing_sources.contains(source_id);
            let duration = self.duration_of(&st, source_id);
            (st.load_seq, failing, duration)
        };

        debug!("Simulated engine loading {} at {:.1}s", source_id, start_seconds);

        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let delay = self.config.load_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut st = lock(&state);
            if st.load_seq != seq {
                return;
            }
            if failing {
                st.source_id = None;
                let _ = events.send(EngineEvent::Error {
                    code: SIMULATED_FAILURE_CODE,
                });
            } else {
                st.anchor.resume();
                let _ = events.send(EngineEvent::Playing);
            }
        });

        if !failing {
            self.spawn_end_watcher(seq, duration);
        }
        Ok(())
    }

    fn play(&self) -> Result<()> {
        let mut st = lock(&self.state);
        if st.source_id.is_none() {
            return Err(Error::Engine("nothing loaded".to_string()));
        }
        if !st.anchor.is_advancing() {
            st.anchor.resume();
            let _ = self.events.send(EngineEvent::Playing);
        }
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        let mut st = lock(&self.state);
        if st.anchor.is_advancing() {
            st.anchor.freeze();
            let _ = self.events.send(EngineEvent::Paused);
        }
        Ok(())
    }

    fn seek(&self, seconds: f64, _exact: bool) -> Result<()> {
        let mut st = lock(&self.state);
        let Some(source) = st.source_id.clone() else {
            return Err(Error::Engine("nothing loaded".to_string()));
        };
        let duration = self.duration_of(&st, &source);
        st.anchor.rebase(seconds.min(duration));
        Ok(())
    }

    fn current_position(&self) -> Result<f64> {
        let st = lock(&self.state);
        match &st.source_id {
            Some(source) => Ok(st.anchor.estimate().min(self.duration_of(&st, source))),
            None => Err(Error::Engine("nothing loaded".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn engine(load_delay_ms: u64) -> (SimulatedEngine, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = SimulatedEngineConfig {
            load_delay: Duration::from_millis(load_delay_ms),
            default_duration_seconds: 60.0,
        };
        (SimulatedEngine::new(tx, config), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_reports_playing_and_advances() {
        let (engine, mut rx) = engine(100);
        engine.load("a", 10.0).unwrap();
        assert_eq!(rx.recv().await, Some(EngineEvent::Playing));
        assert_eq!(engine.loaded_source().as_deref(), Some("a"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        let pos = engine.current_position().unwrap();
        assert!((pos - 12.0).abs() < 0.2, "position {}", pos);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_seek_play() {
        let (engine, mut rx) = engine(0);
        engine.load("a", 0.0).unwrap();
        assert_eq!(rx.recv().await, Some(EngineEvent::Playing));

        engine.pause().unwrap();
        assert_eq!(rx.recv().await, Some(EngineEvent::Paused));
        engine.seek(30.0, true).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(engine.current_position().unwrap(), 30.0);

        engine.play().unwrap();
        assert_eq!(rx.recv().await, Some(EngineEvent::Playing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaching_media_end_reports_ended() {
        let (engine, mut rx) = engine(0);
        engine.set_duration("short", 3.0);
        engine.load("short", 0.0).unwrap();
        assert_eq!(rx.recv().await, Some(EngineEvent::Playing));
        assert_eq!(rx.recv().await, Some(EngineEvent::Ended));
        assert_eq!(engine.current_position().unwrap(), 3.0);
        assert!(!engine.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_source_reports_error() {
        let (engine, mut rx) = engine(50);
        engine.fail_source("bad");
        engine.load("bad", 0.0).unwrap();
        assert_eq!(
            rx.recv().await,
            Some(EngineEvent::Error {
                code: SIMULATED_FAILURE_CODE
            })
        );
        assert!(engine.current_position().is_err());

        engine.heal_source("bad");
        engine.load("bad", 0.0).unwrap();
        assert_eq!(rx.recv().await, Some(EngineEvent::Playing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_supersedes_pending_load() {
        let (engine, mut rx) = engine(100);
        engine.load("a", 0.0).unwrap();
        engine.load("b", 5.0).unwrap();
        assert_eq!(rx.recv().await, Some(EngineEvent::Playing));
        tokio::time::sleep(Duration::from_millis(500)).await;
        // Only one Playing report: the first load's task saw a newer sequence
        assert!(rx.try_recv().is_err());
        assert_eq!(engine.loaded_source().as_deref(), Some("b"));
    }

    #[test]
    fn test_commands_without_source_fail() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let engine = SimulatedEngine::new(tx, SimulatedEngineConfig::default());
        assert!(engine.play().is_err());
        assert!(engine.seek(1.0, false).is_err());
        assert!(engine.current_position().is_err());
        assert!(engine.pause().is_ok());
    }
}
