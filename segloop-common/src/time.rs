//! Timestamp utilities
//!
//! Boundary deadlines are wall-clock instants (they must survive a process
//! restart), so everything that compares against them reads the time through
//! [`WallClock`].

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Mutex;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert (possibly fractional) seconds to a non-negative std duration
///
/// Saturates at `Duration::MAX` instead of panicking on huge values.
pub fn seconds_to_duration(seconds: f64) -> std::time::Duration {
    if seconds.is_finite() && seconds > 0.0 {
        std::time::Duration::try_from_secs_f64(seconds).unwrap_or(std::time::Duration::MAX)
    } else {
        std::time::Duration::ZERO
    }
}

/// Wall-clock instant `seconds` after `from`, saturating at the latest
/// representable instant
pub fn deadline_after(from: DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
    let millis = if seconds.is_finite() && seconds > 0.0 {
        // `as` saturates at i64::MAX
        (seconds * 1000.0).round() as i64
    } else {
        0
    };
    ChronoDuration::try_milliseconds(millis)
        .and_then(|offset| from.checked_add_signed(offset))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Source of wall-clock time
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward by `millis`
    pub fn advance_millis(&self, millis: i64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += ChronoDuration::milliseconds(millis);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
