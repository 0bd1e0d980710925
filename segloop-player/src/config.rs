//! Runtime configuration for segloop-player
//!
//! Resolution priority: command line > environment > TOML file > defaults.
//! Environment fallbacks for CLI flags are handled by clap's `env`
//! attributes; the TOML file supplies scheduler tuning.

use crate::error::{Error, Result};
use crate::scheduler::SchedulerConfig;
use segloop_common::config::{load_file_config, resolve_db_path, resolve_port};
use segloop_common::PlaybackMode;
use std::path::PathBuf;
use tracing::info;

pub const PORT_ENV: &str = "SEGLOOP_PORT";
pub const DB_ENV: &str = "SEGLOOP_DB";

/// Which engine drives playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EngineKind {
    /// Real player in an embed page, bridged over HTTP/SSE
    Bridge,
    /// Virtual player on the tokio clock
    Simulated,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Bridge => write!(f, "bridge"),
            EngineKind::Simulated => write!(f, "simulated"),
        }
    }
}

/// Values taken from the command line (or their env fallbacks)
#[derive(Debug, Clone)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub db: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub engine: EngineKind,
    pub mode: Option<PlaybackMode>,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub engine: EngineKind,
    pub scheduler: SchedulerConfig,
}

impl Config {
    pub fn load(cli: &CliOverrides) -> Result<Self> {
        let file = load_file_config(cli.config.as_deref()).map_err(|e| Error::Config(e.to_string()))?;

        let port = resolve_port(cli.port, PORT_ENV, &file);
        let db_path = resolve_db_path(cli.db.as_deref(), DB_ENV, &file);

        let mut scheduler = SchedulerConfig::from(file.scheduler.clone());
        if let Some(mode) = cli.mode {
            scheduler.mode = mode;
        }

        info!(
            "Configuration: port {}, db {}, engine {}, mode {}",
            port,
            db_path.display(),
            cli.engine,
            scheduler.mode
        );

        Ok(Self {
            port,
            db_path,
            engine: cli.engine,
            scheduler,
        })
    }
}
