//! Test helper modules for segloop-player integration tests
//!
//! - RecordingEngine: engine double recording every command
//! - Harness: hand-driven scheduler with manual wall clock and memory store

#![allow(dead_code)]

pub mod harness;
pub mod recording_engine;

pub use harness::{drain_events, test_config, Harness};
pub use recording_engine::RecordingEngine;
