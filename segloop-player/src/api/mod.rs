//! HTTP control API
//!
//! Playback commands, playlist editing, visibility reports, the SSE event
//! stream and the embed bridge endpoints.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
