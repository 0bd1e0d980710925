//! Playback-related supporting types for events

use serde::{Deserialize, Serialize};

/// Which signal source reported a segment boundary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoundarySource {
    /// Foreground position polling
    Monitor,
    /// Background timer (delegated service, worker heartbeat or local timeout)
    Timer,
    /// Catch-up after the client became visible again, or at startup
    Reconciler,
    /// Native end of media reported by the engine
    Ended,
    /// Segment failed permanently and is skipped
    Failure,
}

impl std::fmt::Display for BoundarySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundarySource::Monitor => write!(f, "monitor"),
            BoundarySource::Timer => write!(f, "timer"),
            BoundarySource::Reconciler => write!(f, "reconciler"),
            BoundarySource::Ended => write!(f, "ended"),
            BoundarySource::Failure => write!(f, "failure"),
        }
    }
}

/// Which background timer mechanism backs the timer facade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerBackendKind {
    /// Timer service running outside the scheduler's context
    Delegated,
    /// Dedicated worker thread broadcasting heartbeats
    WorkerHeartbeat,
    /// Plain timeout on the scheduler's runtime
    LocalTimeout,
}

impl std::fmt::Display for TimerBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerBackendKind::Delegated => write!(f, "delegated"),
            TimerBackendKind::WorkerHeartbeat => write!(f, "worker_heartbeat"),
            TimerBackendKind::LocalTimeout => write!(f, "local_timeout"),
        }
    }
}
