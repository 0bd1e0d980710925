//! Data model shared by the player and its persistence layer
//!
//! Persisted JSON uses camelCase field names and ignores unknown fields, so
//! records written by newer builds still load.

use crate::time_spec;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable segment identity
pub type SegmentId = Uuid;

/// Counter of play-throughs, used to tell stale boundary signals apart
pub type Generation = u64;

/// Largest accepted offset (100 days)
pub const MAX_OFFSET_SECONDS: f64 = 100.0 * 24.0 * 3600.0;

/// One playlist entry: a media source plus optional start/end offsets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: SegmentId,
    /// Opaque media reference handed to the playback engine
    pub source_id: String,
    #[serde(default)]
    pub start_offset_seconds: Option<f64>,
    #[serde(default)]
    pub end_offset_seconds: Option<f64>,
}

impl Segment {
    /// Create a segment with a fresh id, validating the offsets
    pub fn new(source_id: impl Into<String>, start: Option<f64>, end: Option<f64>) -> Result<Self> {
        let segment = Self {
            id: Uuid::new_v4(),
            source_id: source_id.into(),
            start_offset_seconds: start,
            end_offset_seconds: end,
        };
        segment.validate()?;
        Ok(segment)
    }

    /// Check offsets: finite, non-negative, and start < end when both are set
    pub fn validate(&self) -> Result<()> {
        if self.source_id.trim().is_empty() {
            return Err(Error::InvalidInput("source id must not be empty".to_string()));
        }
        for (name, value) in [
            ("start", self.start_offset_seconds),
            ("end", self.end_offset_seconds),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(Error::InvalidInput(format!("{} offset must be a non-negative number, got {}", name, v)));
                }
                if v > MAX_OFFSET_SECONDS {
                    return Err(Error::InvalidInput(format!(
                        "{} offset {} exceeds the {}s limit",
                        name, v, MAX_OFFSET_SECONDS
                    )));
                }
            }
        }
        if let (Some(start), Some(end)) = (self.start_offset_seconds, self.end_offset_seconds) {
            if start >= end {
                return Err(Error::InvalidInput(format!(
                    "start offset ({}) must be before end offset ({})",
                    time_spec::format(Some(start)),
                    time_spec::format(Some(end))
                )));
            }
        }
        Ok(())
    }

    /// Where playback (re)starts: the start offset, or the beginning of the media
    pub fn loop_start(&self) -> f64 {
        self.start_offset_seconds.unwrap_or(0.0)
    }

    /// Length of one full pass through a bounded segment
    pub fn span(&self) -> Option<f64> {
        self.end_offset_seconds.map(|end| (end - self.loop_start()).max(0.0))
    }

    /// Seconds left until the boundary from `position`
    pub fn remaining_from(&self, position: f64) -> Option<f64> {
        self.end_offset_seconds.map(|end| (end - position).max(0.0))
    }
}

/// Playlist entry as stored: the segment plus its permanent-failure flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    #[serde(flatten)]
    pub segment: Segment,
    #[serde(default)]
    pub failed: bool,
}

/// Serialized playlist document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDocument {
    #[serde(default)]
    pub entries: Vec<PlaylistEntry>,
    #[serde(default)]
    pub current_id: Option<SegmentId>,
}

/// What happens when a segment boundary is reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Seek back to the segment start and keep playing
    #[default]
    Loop,
    /// Move on to the next playlist entry
    Advance,
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackMode::Loop => write!(f, "loop"),
            PlaybackMode::Advance => write!(f, "advance"),
        }
    }
}

impl std::str::FromStr for PlaybackMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loop" => Ok(PlaybackMode::Loop),
            "advance" | "autoplay" => Ok(PlaybackMode::Advance),
            other => Err(Error::InvalidInput(format!("unknown playback mode: {}", other))),
        }
    }
}

/// Scheduler's view of the playback engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Loading => write!(f, "loading"),
            EngineState::Playing => write!(f, "playing"),
            EngineState::Paused => write!(f, "paused"),
        }
    }
}

/// Persisted "this segment should end at" record
///
/// Written when a bounded segment starts or resumes, and refreshed when the
/// client goes hidden, so a boundary crossed while every timer was suspended
/// can be caught up later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedBoundaryRecord {
    pub segment_id: SegmentId,
    pub source_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expected_end_wall_clock: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub recorded_at: DateTime<Utc>,
}

impl ExpectedBoundaryRecord {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.expected_end_wall_clock
    }
}
