//! Event types for the segloop event system
//!
//! Provides the shared event definitions and the EventBus used to fan them
//! out to SSE clients.

mod playback_types;

pub use playback_types::{BoundarySource, TimerBackendKind};

use crate::models::{EngineState, Generation, PlaybackMode, SegmentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Segloop event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SegloopEvent {
    /// Scheduler state changed
    PlaybackStateChanged {
        old_state: EngineState,
        new_state: EngineState,
        paused_by_user: bool,
        timestamp: DateTime<Utc>,
    },

    /// A segment was loaded and is starting a new generation
    SegmentStarted {
        segment_id: SegmentId,
        source_id: String,
        generation: Generation,
        timestamp: DateTime<Utc>,
    },

    /// A boundary signal was accepted and acted upon
    BoundaryReached {
        segment_id: SegmentId,
        generation: Generation,
        source: BoundarySource,
        timestamp: DateTime<Utc>,
    },

    /// Loop mode restarted the segment at its start offset
    SegmentLooped {
        segment_id: SegmentId,
        generation: Generation,
        start_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// Advance mode moved the cursor to another entry
    SegmentAdvanced {
        from_segment_id: SegmentId,
        to_segment_id: SegmentId,
        timestamp: DateTime<Utc>,
    },

    /// Position sample while playing
    PlaybackProgress {
        segment_id: SegmentId,
        position_seconds: f64,
        end_offset_seconds: Option<f64>,
        timestamp: DateTime<Utc>,
    },

    /// Retry budget exhausted; the segment is flagged as failed
    SegmentFailed {
        segment_id: SegmentId,
        attempts: u32,
        last_error: String,
        timestamp: DateTime<Utc>,
    },

    /// Playlist entries or cursor changed
    PlaylistChanged {
        entry_count: usize,
        current_id: Option<SegmentId>,
        timestamp: DateTime<Utc>,
    },

    /// Boundary behaviour switched between loop and advance
    ModeChanged {
        mode: PlaybackMode,
        timestamp: DateTime<Utc>,
    },
}

impl SegloopEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            SegloopEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            SegloopEvent::SegmentStarted { .. } => "SegmentStarted",
            SegloopEvent::BoundaryReached { .. } => "BoundaryReached",
            SegloopEvent::SegmentLooped { .. } => "SegmentLooped",
            SegloopEvent::SegmentAdvanced { .. } => "SegmentAdvanced",
            SegloopEvent::PlaybackProgress { .. } => "PlaybackProgress",
            SegloopEvent::SegmentFailed { .. } => "SegmentFailed",
            SegloopEvent::PlaylistChanged { .. } => "PlaylistChanged",
            SegloopEvent::ModeChanged { .. } => "ModeChanged",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally: publishing never blocks, slow
/// subscribers see a lag error instead of stalling producers.
///
/// # Examples
///
/// ```
/// use segloop_common::events::{EventBus, SegloopEvent};
/// use segloop_common::PlaybackMode;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(SegloopEvent::ModeChanged {
///     mode: PlaybackMode::Advance,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SegloopEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SegloopEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SegloopEvent,
    ) -> Result<usize, broadcast::error::SendError<SegloopEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SegloopEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
