//! Position extrapolation between engine reports
//!
//! The engine reports its position only occasionally. Between reports the
//! position is estimated as `anchor + elapsed` while playing, using the
//! monotonic tokio clock.

use tokio::time::Instant;

/// Last known position plus the instant it was observed
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionAnchor {
    /// Anchor position in seconds (finite, >= 0)
    position: f64,
    /// Set while playing; `None` when paused or unknown
    since: Option<Instant>,
}

impl PositionAnchor {
    /// Anchor at `position` without advancing
    pub fn paused_at(position: f64) -> Self {
        Self {
            position: sanitize(position),
            since: None,
        }
    }

    /// Anchor at `position`, advancing from now
    pub fn playing_from(position: f64) -> Self {
        Self {
            position: sanitize(position),
            since: Some(Instant::now()),
        }
    }

    pub fn is_advancing(&self) -> bool {
        self.since.is_some()
    }

    /// Current estimate
    pub fn estimate(&self) -> f64 {
        match self.since {
            Some(since) => self.position + since.elapsed().as_secs_f64(),
            None => self.position,
        }
    }

    /// Freeze at the current estimate
    pub fn freeze(&mut self) {
        *self = Self::paused_at(self.estimate());
    }

    /// Start advancing from the current estimate
    pub fn resume(&mut self) {
        if self.since.is_none() {
            *self = Self::playing_from(self.position);
        }
    }

    /// Replace the anchor, keeping the advancing flag
    pub fn rebase(&mut self, position: f64) {
        *self = if self.is_advancing() {
            Self::playing_from(position)
        } else {
            Self::paused_at(position)
        };
    }
}

fn sanitize(position: f64) -> f64 {
    if position.is_finite() && position > 0.0 {
        position
    } else {
        0.0
    }
}
