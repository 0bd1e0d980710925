//! Engine double that records every command
//!
//! Position is whatever the test last set (loads and seeks move it too); it
//! never advances on its own, which keeps monitor samples deterministic.

use segloop_player::engine::{EngineCommand, PlaybackEngine};
use segloop_player::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct RecordingEngine {
    commands: Mutex<Vec<EngineCommand>>,
    position: Mutex<f64>,
    reject_loads: AtomicBool,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn commands(&self) -> Vec<EngineCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }

    /// Every load issued, as (source, start)
    pub fn loads(&self) -> Vec<(String, f64)> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                EngineCommand::Load { source_id, start_seconds } => Some((source_id, start_seconds)),
                _ => None,
            })
            .collect()
    }

    pub fn loads_of(&self, source_id: &str) -> usize {
        self.loads().iter().filter(|(s, _)| s == source_id).count()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                EngineCommand::Seek { seconds, .. } => Some(seconds),
                _ => None,
            })
            .collect()
    }

    pub fn set_position(&self, seconds: f64) {
        *self.position.lock().unwrap() = seconds;
    }

    /// Make `load` fail synchronously, as an undeliverable command would
    pub fn reject_loads(&self, reject: bool) {
        self.reject_loads.store(reject, Ordering::SeqCst);
    }

    fn record(&self, command: EngineCommand) {
        self.commands.lock().unwrap().push(command);
    }
}

impl PlaybackEngine for RecordingEngine {
    fn load(&self, source_id: &str, start_seconds: f64) -> Result<()> {
        self.record(EngineCommand::Load {
            source_id: source_id.to_string(),
            start_seconds,
        });
        if self.reject_loads.load(Ordering::SeqCst) {
            return Err(Error::Engine("load rejected".to_string()));
        }
        self.set_position(start_seconds);
        Ok(())
    }

    fn play(&self) -> Result<()> {
        self.record(EngineCommand::Play);
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.record(EngineCommand::Pause);
        Ok(())
    }

    fn seek(&self, seconds: f64, exact: bool) -> Result<()> {
        self.record(EngineCommand::Seek { seconds, exact });
        self.set_position(seconds);
        Ok(())
    }

    fn current_position(&self) -> Result<f64> {
        Ok(*self.position.lock().unwrap())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
