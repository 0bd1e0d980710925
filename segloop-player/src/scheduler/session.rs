//! Playback session
//!
//! Everything the scheduler knows about the segment it is currently driving.
//! Replaced wholesale when the current segment changes identity.

use crate::timers::TimerHandle;
use segloop_common::models::Generation;
use segloop_common::{EngineState, Segment, SegmentId};

#[derive(Debug, Clone, Default)]
pub struct PlaybackSession {
    /// `None` only while idle
    pub segment: Option<Segment>,
    pub engine_state: EngineState,
    /// Distinguishes a user pause from one the engine reported on its own
    pub paused_by_user: bool,
    pub generation: Generation,
    /// Last (segment, generation) a boundary action ran for
    pub acted: Option<(SegmentId, Generation)>,
    pub last_known_position: Option<f64>,
    /// Position of the last loop seek, until playback moves past it
    pub restarted_at: Option<f64>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub timer: Option<TimerHandle>,
}

impl PlaybackSession {
    /// Fresh session for a newly selected segment
    pub fn for_segment(segment: Segment) -> Self {
        Self {
            segment: Some(segment),
            ..Default::default()
        }
    }

    pub fn segment_id(&self) -> Option<SegmentId> {
        self.segment.as_ref().map(|s| s.id)
    }

    /// Whether (segment, generation) names the live generation
    pub fn is_current(&self, segment_id: SegmentId, generation: Generation) -> bool {
        self.segment_id() == Some(segment_id) && self.generation == generation
    }

    /// Whether the boundary action already ran for the live generation
    pub fn already_acted(&self) -> bool {
        match (self.segment_id(), self.acted) {
            (Some(id), Some(acted)) => acted == (id, self.generation),
            _ => false,
        }
    }

    pub fn mark_acted(&mut self) {
        self.acted = self.segment_id().map(|id| (id, self.generation));
    }

    /// Whether an end-of-media report at `position` belongs to a pass a
    /// loop restart already closed
    ///
    /// `window` is how far playback may have moved since the seek before
    /// the report counts as a genuine end.
    pub fn ended_before_restart(&self, position: f64, window: f64) -> bool {
        match self.restarted_at {
            Some(start) => position < start + window,
            None => false,
        }
    }
}
