//! Configuration loading and path resolution
//!
//! Values are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::models::PlaybackMode;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5750;

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerSection,
    pub scheduler: SchedulerSection,
}

/// `[server]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
}

/// `[scheduler]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// Position polling cadence while playing
    pub poll_interval_ms: u64,
    /// Heartbeat period of the background worker
    pub heartbeat_interval_ms: u64,
    /// Delay before reloading a segment after an engine error
    pub retry_backoff_ms: u64,
    /// Consecutive engine errors tolerated per segment
    pub max_consecutive_failures: u32,
    /// Allow the delegated timer service backend
    pub delegated_timer: bool,
    /// Allow the worker heartbeat backend
    pub worker_heartbeat: bool,
    /// Loop or advance at segment boundaries
    pub mode: PlaybackMode,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            heartbeat_interval_ms: 1000,
            retry_backoff_ms: 3000,
            max_consecutive_failures: 3,
            delegated_timer: true,
            worker_heartbeat: true,
            mode: PlaybackMode::Loop,
        }
    }
}

impl SchedulerSection {
    /// Clamp values into workable ranges
    pub fn sanitized(mut self) -> Self {
        self.poll_interval_ms = self.poll_interval_ms.clamp(50, 10_000);
        self.heartbeat_interval_ms = self.heartbeat_interval_ms.clamp(10, 10_000);
        self.retry_backoff_ms = self.retry_backoff_ms.min(600_000);
        self.max_consecutive_failures = self.max_consecutive_failures.max(1);
        self
    }
}

/// Parse a TOML config document
pub fn parse_config(toml_content: &str) -> Result<FileConfig> {
    toml::from_str(toml_content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
}

/// Load the config file
///
/// An explicit path must exist and parse. Without one, the platform default
/// location is tried; a missing default file yields the defaults and an
/// unreadable one is logged and ignored.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        return parse_config(&content);
    }

    let Some(path) = default_config_path() else {
        return Ok(FileConfig::default());
    };
    if !path.exists() {
        return Ok(FileConfig::default());
    }

    match std::fs::read_to_string(&path).map_err(Error::from).and_then(|c| parse_config(&c)) {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!("Ignoring config file {}: {}", path.display(), e);
            Ok(FileConfig::default())
        }
    }
}

/// Resolve the database path (CLI > env > TOML > default)
pub fn resolve_db_path(cli_arg: Option<&Path>, env_var_name: &str, file: &FileConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &file.server.db_path {
        return path.clone();
    }

    default_db_path()
}

/// Resolve the HTTP port (CLI > env > TOML > default)
pub fn resolve_port(cli_arg: Option<u16>, env_var_name: &str, file: &FileConfig) -> u16 {
    if let Some(port) = cli_arg {
        return port;
    }

    if let Ok(value) = std::env::var(env_var_name) {
        match value.parse() {
            Ok(port) => return port,
            Err(_) => warn!("Ignoring invalid {}={}", env_var_name, value),
        }
    }

    file.server.port.unwrap_or(DEFAULT_PORT)
}

/// Platform config file location (`<config dir>/segloop/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("segloop").join("config.toml"))
}

/// Platform data location for the database
fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("segloop"))
        .unwrap_or_else(|| PathBuf::from("./segloop_data"))
        .join("segloop.db")
}
