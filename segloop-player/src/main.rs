//! segloop-player - Main entry point
//!
//! Serves the control API and runs the segment scheduler against either an
//! embed-page bridge or the simulated engine.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use segloop_common::db::{init_database, KeyValueStore, SqliteStore};
use segloop_common::events::EventBus;
use segloop_common::time::SystemClock;
use segloop_common::PlaybackMode;
use segloop_player::api::{self, AppContext};
use segloop_player::config::{CliOverrides, Config, EngineKind};
use segloop_player::engine::{BridgeEngine, PlaybackEngine, SimulatedEngine, SimulatedEngineConfig};
use segloop_player::playlist::Playlist;
use segloop_player::scheduler::{PlaybackScheduler, SchedulerDeps};
use segloop_player::state::SharedState;
use segloop_player::visibility::VisibilitySignal;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for segloop-player
#[derive(Parser, Debug)]
#[command(name = "segloop-player")]
#[command(about = "Segment loop and playlist scheduler")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "SEGLOOP_PORT")]
    port: Option<u16>,

    /// SQLite database file
    #[arg(long, env = "SEGLOOP_DB")]
    db: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "SEGLOOP_CONFIG")]
    config: Option<PathBuf>,

    /// Playback engine
    #[arg(long, value_enum, default_value_t = EngineKind::Bridge, env = "SEGLOOP_ENGINE")]
    engine: EngineKind,

    /// Boundary behaviour: loop or advance
    #[arg(long, env = "SEGLOOP_LOOP_MODE")]
    loop_mode: Option<PlaybackMode>,
}

/// Capacity of the event bus and the embed command channel
const CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "segloop_player=debug,segloop_common=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting segloop-player v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&CliOverrides {
        port: args.port,
        db: args.db,
        config: args.config,
        engine: args.engine,
        mode: args.loop_mode,
    })
    .context("Failed to load configuration")?;

    let pool = init_database(&config.db_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::new(pool));

    let event_bus = EventBus::new(CHANNEL_CAPACITY);
    let state = Arc::new(SharedState::new(event_bus.clone()));
    let playlist = Arc::new(Playlist::restore(Arc::clone(&store), event_bus).await);

    let (engine_tx, engine_rx) = mpsc::unbounded_channel();
    let (engine, bridge): (Arc<dyn PlaybackEngine>, Option<Arc<BridgeEngine>>) = match config.engine {
        EngineKind::Bridge => {
            let bridge = Arc::new(BridgeEngine::new(engine_tx, CHANNEL_CAPACITY));
            let engine: Arc<dyn PlaybackEngine> = bridge.clone();
            (engine, Some(bridge))
        }
        EngineKind::Simulated => {
            let engine: Arc<dyn PlaybackEngine> =
                Arc::new(SimulatedEngine::new(engine_tx, SimulatedEngineConfig::default()));
            (engine, None)
        }
    };
    let engine_name = engine.name();

    let visibility = VisibilitySignal::new();
    let deps = SchedulerDeps {
        engine,
        playlist: Arc::clone(&playlist),
        store,
        clock: Arc::new(SystemClock),
        state: Arc::clone(&state),
    };
    let (scheduler, scheduler_task) = PlaybackScheduler::spawn(deps, config.scheduler.clone(), engine_rx, &visibility);

    let ctx = AppContext {
        state,
        scheduler: scheduler.clone(),
        playlist,
        visibility,
        bridge,
        engine_name,
    };

    api::run(config.port, ctx, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Persist the boundary record before exiting
    if scheduler.shutdown().is_ok() {
        if let Err(e) = scheduler_task.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
