//! Delegated timer service
//!
//! Timers are handed to a service that runs outside the async runtime, so a
//! stalled or throttled runtime cannot delay them. Completions are reported
//! through the notify callback given at spawn time.

use super::TimerHandle;
use crate::error::{Error, Result};
use std::collections::{BinaryHeap, HashSet};
use std::cmp::Reverse;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Stand-in deadline for delays past what `Instant` can represent
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Timer service living outside the scheduler's context
pub trait DelegatedTimerService: Send + Sync {
    /// Fire `handle` once after `after` has elapsed
    fn schedule(&self, handle: TimerHandle, after: Duration) -> Result<()>;

    /// Cancel a scheduled timer; unknown handles are ignored
    fn cancel(&self, handle: TimerHandle);
}

enum Request {
    Schedule(TimerHandle, Instant),
    Cancel(TimerHandle),
    Shutdown,
}

/// Deadline heap serviced by a dedicated OS thread
pub struct ThreadTimerService {
    requests: Mutex<mpsc::Sender<Request>>,
    thread: Option<JoinHandle<()>>,
}

impl ThreadTimerService {
    pub fn spawn<F>(notify: F) -> Result<Self>
    where
        F: Fn(TimerHandle) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("segloop-timer".to_string())
            .spawn(move || run_service(rx, notify))
            .map_err(|e| Error::Timer(format!("failed to start timer thread: {}", e)))?;

        debug!("Delegated timer service started");
        Ok(Self {
            requests: Mutex::new(tx),
            thread: Some(thread),
        })
    }

    fn send(&self, request: Request) -> Result<()> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .send(request)
            .map_err(|_| Error::Timer("timer thread has exited".to_string()))
    }
}

impl DelegatedTimerService for ThreadTimerService {
    fn schedule(&self, handle: TimerHandle, after: Duration) -> Result<()> {
        let now = Instant::now();
        let at = now.checked_add(after).unwrap_or(now + FAR_FUTURE);
        self.send(Request::Schedule(handle, at))
    }

    fn cancel(&self, handle: TimerHandle) {
        let _ = self.send(Request::Cancel(handle));
    }
}

impl Drop for ThreadTimerService {
    fn drop(&mut self) {
        let _ = self.send(Request::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Delegated timer thread panicked");
            }
        }
    }
}

fn run_service<F>(rx: mpsc::Receiver<Request>, notify: F)
where
    F: Fn(TimerHandle),
{
    let mut deadlines: BinaryHeap<Reverse<(Instant, TimerHandle)>> = BinaryHeap::new();
    let mut live: HashSet<TimerHandle> = HashSet::new();

    loop {
        let now = Instant::now();
        while let Some(Reverse((at, handle))) = deadlines.peek().copied() {
            if at > now {
                break;
            }
            deadlines.pop();
            if live.remove(&handle) {
                notify(handle);
            }
        }

        let request = match deadlines.peek() {
            Some(Reverse((at, _))) => match rx.recv_timeout(at.saturating_duration_since(now)) {
                Ok(request) => request,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(request) => request,
                Err(_) => break,
            },
        };

        match request {
            Request::Schedule(handle, at) => {
                live.insert(handle);
                deadlines.push(Reverse((at, handle)));
            }
            Request::Cancel(handle) => {
                live.remove(&handle);
            }
            Request::Shutdown => break,
        }
    }

    debug!("Delegated timer service stopped");
}
