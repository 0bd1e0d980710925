//! Error types for segloop-player
//!
//! Only the HTTP layer and startup surface these to a caller; the scheduler
//! itself absorbs every failure (see `scheduler::FailureKind`).

use thiserror::Error;

/// Main error type for segloop-player
#[derive(Error, Debug)]
pub enum Error {
    /// Errors from the shared library (persistence, validation)
    #[error(transparent)]
    Common(#[from] segloop_common::Error),

    /// Playback engine command failed
    #[error("Engine error: {0}")]
    Engine(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Background timer setup errors
    #[error("Timer error: {0}")]
    Timer(String),

    /// Scheduler is gone or not accepting commands
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience Result type using segloop-player Error
pub type Result<T> = std::result::Result<T, Error>;
