//! Heartbeat worker
//!
//! A dedicated thread broadcasts wall-clock timestamps at a fixed period.
//! It knows nothing about segments: each listener compares the timestamps
//! against its own deadlines.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use segloop_common::time::WallClock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Timestamped heartbeat message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub at: DateTime<Utc>,
}

pub struct HeartbeatWorker {
    tx: broadcast::Sender<Heartbeat>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl HeartbeatWorker {
    pub fn spawn(interval: Duration, clock: Arc<dyn WallClock>) -> Result<Self> {
        let (tx, _) = broadcast::channel(16);
        let stop = Arc::new(AtomicBool::new(false));

        let thread_tx = tx.clone();
        let thread_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("segloop-heartbeat".to_string())
            .spawn(move || {
                while !thread_stop.load(Ordering::Acquire) {
                    thread::park_timeout(interval);
                    if thread_stop.load(Ordering::Acquire) {
                        break;
                    }
                    // No listeners is fine; they may subscribe later
                    let _ = thread_tx.send(Heartbeat { at: clock.now() });
                }
            })
            .map_err(|e| Error::Timer(format!("failed to start heartbeat thread: {}", e)))?;

        debug!("Heartbeat worker started ({}ms)", interval.as_millis());
        Ok(Self {
            tx,
            stop,
            thread: Some(thread),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Heartbeat> {
        self.tx.subscribe()
    }
}

impl Drop for HeartbeatWorker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                warn!("Heartbeat thread panicked");
            }
        }
        debug!("Heartbeat worker stopped");
    }
}
