//! Playback engine contract
//!
//! The engine is an opaque external player. Every command is fire-and-forget:
//! its effect is observed later through [`EngineEvent`]s or position polling,
//! never through the return value. A returned `Err` only means the command
//! could not be delivered.

mod bridge;
mod position;
mod simulated;

pub use bridge::{BridgeEngine, EngineReport, ReportedEvent};
pub use position::PositionAnchor;
pub use simulated::{SimulatedEngine, SimulatedEngineConfig};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum EngineEvent {
    Playing,
    Paused,
    /// Native end of media (not a configured boundary)
    Ended,
    Error { code: i64 },
}

/// Channel the engine delivers its events on
pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;

/// Commands issued to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum EngineCommand {
    Load { source_id: String, start_seconds: f64 },
    Play,
    Pause,
    Seek { seconds: f64, exact: bool },
}

/// External playback engine
pub trait PlaybackEngine: Send + Sync {
    /// Load a media source and start playing at `start_seconds`
    fn load(&self, source_id: &str, start_seconds: f64) -> Result<()>;

    fn play(&self) -> Result<()>;

    fn pause(&self) -> Result<()>;

    /// Seek within the loaded source; `exact` asks for frame-accurate seeking
    fn seek(&self, seconds: f64, exact: bool) -> Result<()>;

    /// Best current position estimate in seconds
    fn current_position(&self) -> Result<f64>;

    /// Short name for logs and status
    fn name(&self) -> &'static str;
}
