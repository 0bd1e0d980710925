//! Segment playback scheduler
//!
//! A single task owns the [`PlaybackSession`] and reacts to everything that
//! can move playback forward: user commands, engine events, monitor samples,
//! background timers, heartbeats, retry deadlines, visibility changes and
//! playlist edits. All of them arrive as [`SchedulerInput`] on one channel,
//! so session state is never shared and never locked.
//!
//! Every (re)load or loop restart starts a new generation. Boundary signals
//! carry the (segment, generation) they were armed for and are acted on at
//! most once; anything else is stale and dropped.

mod actor;
mod handle;
mod session;

pub use actor::{PlaybackScheduler, SchedulerDeps};
pub use handle::SchedulerHandle;
pub use session::PlaybackSession;

use crate::engine::EngineEvent;
use crate::playlist::PlaylistChange;
use crate::timers::{TimerHandle, TimerOptions};
use chrono::{DateTime, Utc};
use segloop_common::config::SchedulerSection;
use segloop_common::events::BoundarySource;
use segloop_common::models::Generation;
use segloop_common::{PlaybackMode, SegmentId};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

/// "This segment should now end" for a specific generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundarySignal {
    pub segment_id: SegmentId,
    pub generation: Generation,
    pub source: BoundarySource,
}

/// Commands issued on behalf of the user
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    /// Make an entry current and load it
    Select(SegmentId),
    Play,
    Pause,
    /// Move to the next playable entry now
    Next,
    /// Unload and return to idle; the playlist cursor is kept
    Stop,
    SetMode(PlaybackMode),
}

/// Everything the scheduler task reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerInput {
    User(UserCommand),
    Engine(EngineEvent),
    /// Boundary raised by the monitor, the reconciler or a permanent failure
    Boundary(BoundarySignal),
    PositionSampled {
        segment_id: SegmentId,
        generation: Generation,
        position: f64,
    },
    /// Completion of a delegated or local background timer
    TimerFired(TimerHandle),
    /// Timestamp broadcast by the heartbeat worker
    Heartbeat(DateTime<Utc>),
    /// Backoff elapsed after an engine error
    RetryLoad {
        segment_id: SegmentId,
        generation: Generation,
    },
    /// Client visibility changed (`true` = visible)
    Visibility(bool),
    Playlist(PlaylistChange),
    /// Persist the boundary record and stop the task
    Shutdown,
}

pub type SchedulerSender = mpsc::UnboundedSender<SchedulerInput>;
pub type SchedulerReceiver = mpsc::UnboundedReceiver<SchedulerInput>;

/// Create the scheduler input channel
pub fn scheduler_channel() -> (SchedulerSender, SchedulerReceiver) {
    mpsc::unbounded_channel()
}

/// Failures the scheduler absorbs instead of propagating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Engine ERROR event or a load command that could not be delivered
    TransientEngineError,
    /// Boundary signal for an old generation, a replaced segment, or while
    /// paused by the user
    StaleSignal,
    /// Persisted boundary record could not be decoded
    PersistenceCorrupt,
    /// Retry budget exhausted for a segment
    PermanentPlaybackFailure,
}

/// Scheduler tuning
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub retry_backoff: Duration,
    pub max_consecutive_failures: u32,
    pub timers: TimerOptions,
    pub mode: PlaybackMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerSection::default().into()
    }
}

impl From<SchedulerSection> for SchedulerConfig {
    fn from(section: SchedulerSection) -> Self {
        let section = section.sanitized();
        Self {
            poll_interval: Duration::from_millis(section.poll_interval_ms),
            retry_backoff: Duration::from_millis(section.retry_backoff_ms),
            max_consecutive_failures: section.max_consecutive_failures,
            timers: TimerOptions {
                delegated_timer: section.delegated_timer,
                worker_heartbeat: section.worker_heartbeat,
                heartbeat_interval: Duration::from_millis(section.heartbeat_interval_ms),
            },
            mode: section.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_section() {
        let section = SchedulerSection {
            poll_interval_ms: 5,
            retry_backoff_ms: 1500,
            max_consecutive_failures: 0,
            worker_heartbeat: false,
            mode: PlaybackMode::Advance,
            ..Default::default()
        };
        let config = SchedulerConfig::from(section);

        // Values are clamped into workable ranges
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.retry_backoff, Duration::from_millis(1500));
        assert_eq!(config.max_consecutive_failures, 1);
        assert!(config.timers.delegated_timer);
        assert!(!config.timers.worker_heartbeat);
        assert_eq!(config.mode, PlaybackMode::Advance);
    }

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.retry_backoff, Duration::from_secs(3));
        assert_eq!(config.max_consecutive_failures, 3);
        assert_eq!(config.mode, PlaybackMode::Loop);
    }
}
