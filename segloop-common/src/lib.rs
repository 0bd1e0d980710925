//! # Segloop Common Library
//!
//! Shared code for the segloop segment player:
//! - Segment and boundary-record models
//! - Event types (SegloopEvent enum) and the EventBus
//! - Key-value persistence (SQLite and in-memory)
//! - Configuration loading
//! - Human time strings (TimeSpec)
//! - Wall clock abstraction

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod time;
pub mod time_spec;

pub use error::{Error, Result};
pub use models::{EngineState, ExpectedBoundaryRecord, PlaybackMode, Segment, SegmentId};
