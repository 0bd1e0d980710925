//! # segloop-player
//!
//! Segment playback scheduler: plays bounded segments of media sources on
//! an external engine and loops or advances at each segment boundary, even
//! when the host runtime throttles timers or the client page is hidden.
//!
//! Several independent sources report boundaries, from position polling to
//! a persisted wall-clock record checked when the client becomes visible.
//! The scheduler acts on the first signal per segment generation and drops
//! the rest.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod playlist;
pub mod reconciler;
pub mod scheduler;
pub mod state;
pub mod timers;
pub mod visibility;

pub use error::{Error, Result};
