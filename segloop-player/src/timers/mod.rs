//! Background timer facade
//!
//! One interface over three mechanisms, chosen once at construction and in
//! this order of preference:
//!
//! 1. a delegated timer service running on its own OS thread
//! 2. a heartbeat worker thread; deadlines are compared against each beat
//! 3. a plain timeout on the scheduler's runtime
//!
//! Whatever the backend, a fired timer reaches the scheduler as
//! [`SchedulerInput::TimerFired`] or [`SchedulerInput::Heartbeat`] and is
//! resolved back to its (segment, generation) through [`on_fired`] or
//! [`on_heartbeat`]. A disarmed timer resolves to nothing.
//!
//! [`on_fired`]: BackgroundTimerFacade::on_fired
//! [`on_heartbeat`]: BackgroundTimerFacade::on_heartbeat

mod delegated;
mod heartbeat;
mod local;

pub use delegated::{DelegatedTimerService, ThreadTimerService};
pub use heartbeat::{Heartbeat, HeartbeatWorker};

use crate::scheduler::{BoundarySignal, SchedulerInput, SchedulerSender};
use chrono::{DateTime, Utc};
use segloop_common::events::{BoundarySource, TimerBackendKind};
use segloop_common::models::Generation;
use segloop_common::time::{deadline_after, seconds_to_duration, WallClock};
use segloop_common::SegmentId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Which backends may be used
#[derive(Debug, Clone)]
pub struct TimerOptions {
    pub delegated_timer: bool,
    pub worker_heartbeat: bool,
    pub heartbeat_interval: Duration,
}

impl TimerOptions {
    /// Skip the thread-backed mechanisms entirely
    pub fn local_only() -> Self {
        Self {
            delegated_timer: false,
            worker_heartbeat: false,
            heartbeat_interval: Duration::from_secs(1),
        }
    }
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self {
            delegated_timer: true,
            worker_heartbeat: true,
            heartbeat_interval: Duration::from_secs(1),
        }
    }
}

/// Opaque id of an armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(pub(crate) u64);

struct PendingTimer {
    segment_id: SegmentId,
    generation: Generation,
    deadline: DateTime<Utc>,
    /// Set when the timer runs as a local timeout
    local: Option<JoinHandle<()>>,
}

enum Backend {
    Delegated(Box<dyn DelegatedTimerService>),
    Heartbeat {
        // Held for its Drop, which stops the thread
        _worker: HeartbeatWorker,
        listener: JoinHandle<()>,
    },
    Local,
}

pub struct BackgroundTimerFacade {
    backend: Backend,
    pending: HashMap<TimerHandle, PendingTimer>,
    next_handle: u64,
    tx: SchedulerSender,
    clock: Arc<dyn WallClock>,
}

impl BackgroundTimerFacade {
    /// Pick the first backend that can be started
    pub fn new(options: &TimerOptions, tx: SchedulerSender, clock: Arc<dyn WallClock>) -> Self {
        let backend = select_backend(options, &tx, &clock);
        Self::from_backend(backend, tx, clock)
    }

    /// Use an externally provided timer service
    pub fn with_service(service: Box<dyn DelegatedTimerService>, tx: SchedulerSender, clock: Arc<dyn WallClock>) -> Self {
        Self::from_backend(Backend::Delegated(service), tx, clock)
    }

    fn from_backend(backend: Backend, tx: SchedulerSender, clock: Arc<dyn WallClock>) -> Self {
        let facade = Self {
            backend,
            pending: HashMap::new(),
            next_handle: 1,
            tx,
            clock,
        };
        info!("Background timers using {} backend", facade.backend());
        facade
    }

    pub fn backend(&self) -> TimerBackendKind {
        match self.backend {
            Backend::Delegated(_) => TimerBackendKind::Delegated,
            Backend::Heartbeat { .. } => TimerBackendKind::WorkerHeartbeat,
            Backend::Local => TimerBackendKind::LocalTimeout,
        }
    }

    /// Arm a one-shot timer for `segment_id` at `generation`
    pub fn arm(&mut self, segment_id: SegmentId, generation: Generation, after_seconds: f64) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;

        let after = seconds_to_duration(after_seconds);
        let deadline = deadline_after(self.clock.now(), after_seconds);

        let local = match &self.backend {
            Backend::Delegated(service) => match service.schedule(handle, after) {
                Ok(()) => None,
                Err(e) => {
                    warn!("Delegated timer rejected, using local timeout: {}", e);
                    Some(local::spawn_timeout(handle, after, self.tx.clone()))
                }
            },
            Backend::Heartbeat { .. } => None,
            Backend::Local => Some(local::spawn_timeout(handle, after, self.tx.clone())),
        };

        debug!(
            "Armed timer {:?} for segment {} gen {} in {:.3}s",
            handle, segment_id, generation, after_seconds
        );
        self.pending.insert(
            handle,
            PendingTimer {
                segment_id,
                generation,
                deadline,
                local,
            },
        );
        handle
    }

    /// Resolve a fired timer; `None` if it was disarmed or already resolved
    pub fn on_fired(&mut self, handle: TimerHandle) -> Option<BoundarySignal> {
        self.pending.remove(&handle).map(|timer| signal_for(&timer))
    }

    /// Resolve every timer whose deadline is at or before the heartbeat
    pub fn on_heartbeat(&mut self, at: DateTime<Utc>) -> Vec<BoundarySignal> {
        let due: Vec<TimerHandle> = self
            .pending
            .iter()
            .filter(|(_, timer)| timer.deadline <= at)
            .map(|(handle, _)| *handle)
            .collect();

        due.into_iter()
            .filter_map(|handle| self.pending.remove(&handle))
            .map(|timer| signal_for(&timer))
            .collect()
    }

    /// Cancel a timer; repeated or unknown handles are ignored
    pub fn disarm(&mut self, handle: TimerHandle) {
        if let Some(timer) = self.pending.remove(&handle) {
            self.cancel(handle, timer);
        }
    }

    pub fn disarm_all(&mut self) {
        let pending: Vec<(TimerHandle, PendingTimer)> = self.pending.drain().collect();
        for (handle, timer) in pending {
            self.cancel(handle, timer);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn cancel(&self, handle: TimerHandle, timer: PendingTimer) {
        if let Some(task) = timer.local {
            task.abort();
        }
        if let Backend::Delegated(service) = &self.backend {
            service.cancel(handle);
        }
    }
}

impl Drop for BackgroundTimerFacade {
    fn drop(&mut self) {
        self.disarm_all();
        if let Backend::Heartbeat { listener, .. } = &self.backend {
            listener.abort();
        }
    }
}

fn signal_for(timer: &PendingTimer) -> BoundarySignal {
    BoundarySignal {
        segment_id: timer.segment_id,
        generation: timer.generation,
        source: BoundarySource::Timer,
    }
}

fn select_backend(options: &TimerOptions, tx: &SchedulerSender, clock: &Arc<dyn WallClock>) -> Backend {
    if options.delegated_timer {
        let notify_tx = tx.clone();
        match ThreadTimerService::spawn(move |handle| {
            let _ = notify_tx.send(SchedulerInput::TimerFired(handle));
        }) {
            Ok(service) => return Backend::Delegated(Box::new(service)),
            Err(e) => warn!("Delegated timer service unavailable: {}", e),
        }
    }

    if options.worker_heartbeat {
        match HeartbeatWorker::spawn(options.heartbeat_interval, Arc::clone(clock)) {
            Ok(worker) => {
                let listener = spawn_heartbeat_listener(worker.subscribe(), tx.clone());
                return Backend::Heartbeat {
                    _worker: worker,
                    listener,
                };
            }
            Err(e) => warn!("Heartbeat worker unavailable: {}", e),
        }
    }

    Backend::Local
}

/// Forward heartbeats into the scheduler channel
fn spawn_heartbeat_listener(mut rx: broadcast::Receiver<Heartbeat>, tx: SchedulerSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(beat) => {
                    if tx.send(SchedulerInput::Heartbeat(beat.at)).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("Heartbeat listener skipped {} beats", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::scheduler_channel;
    use segloop_common::time::{ManualClock, SystemClock};
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Service that records requests and fires only when told to
    #[derive(Default, Clone)]
    struct ManualService {
        scheduled: Arc<Mutex<Vec<(TimerHandle, Duration)>>>,
        cancelled: Arc<Mutex<Vec<TimerHandle>>>,
    }

    impl DelegatedTimerService for ManualService {
        fn schedule(&self, handle: TimerHandle, after: Duration) -> crate::Result<()> {
            self.scheduled.lock().unwrap().push((handle, after));
            Ok(())
        }

        fn cancel(&self, handle: TimerHandle) {
            self.cancelled.lock().unwrap().push(handle);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_timer_fires_once() {
        let (tx, mut rx) = scheduler_channel();
        let mut facade = BackgroundTimerFacade::new(&TimerOptions::local_only(), tx, Arc::new(SystemClock));
        assert_eq!(facade.backend(), TimerBackendKind::LocalTimeout);

        let seg = Uuid::new_v4();
        let handle = facade.arm(seg, 3, 2.5);

        let input = rx.recv().await.unwrap();
        assert_eq!(input, SchedulerInput::TimerFired(handle));

        let signal = facade.on_fired(handle).unwrap();
        assert_eq!(signal.segment_id, seg);
        assert_eq!(signal.generation, 3);
        assert_eq!(signal.source, BoundarySource::Timer);

        // Second resolution is a no-op
        assert!(facade.on_fired(handle).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_local_timer_never_fires() {
        let (tx, mut rx) = scheduler_channel();
        let mut facade = BackgroundTimerFacade::new(&TimerOptions::local_only(), tx, Arc::new(SystemClock));

        let handle = facade.arm(Uuid::new_v4(), 1, 1.0);
        facade.disarm(handle);
        facade.disarm(handle);
        assert_eq!(facade.pending_count(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert!(facade.on_fired(handle).is_none());
    }

    #[test]
    fn test_delegated_service_receives_schedule_and_cancel() {
        let (tx, _rx) = scheduler_channel();
        let service = ManualService::default();
        let mut facade = BackgroundTimerFacade::with_service(
            Box::new(service.clone()),
            tx,
            Arc::new(SystemClock),
        );
        assert_eq!(facade.backend(), TimerBackendKind::Delegated);

        let a = facade.arm(Uuid::new_v4(), 1, 4.0);
        let b = facade.arm(Uuid::new_v4(), 1, 0.5);
        assert_ne!(a, b);
        assert_eq!(
            *service.scheduled.lock().unwrap(),
            vec![(a, Duration::from_secs(4)), (b, Duration::from_millis(500))]
        );

        facade.disarm_all();
        let mut cancelled = service.cancelled.lock().unwrap().clone();
        cancelled.sort();
        assert_eq!(cancelled, vec![a, b]);
    }

    #[test]
    fn test_heartbeat_resolves_due_deadlines() {
        let (tx, _rx) = scheduler_channel();
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let mut facade = BackgroundTimerFacade::with_service(Box::new(ManualService::default()), tx, clock);

        let seg = Uuid::new_v4();
        facade.arm(seg, 1, 2.0);
        facade.arm(seg, 2, 10.0);

        assert!(facade.on_heartbeat(start + chrono::Duration::seconds(1)).is_empty());

        let due = facade.on_heartbeat(start + chrono::Duration::seconds(2));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].generation, 1);
        assert_eq!(facade.pending_count(), 1);

        let due = facade.on_heartbeat(start + chrono::Duration::seconds(30));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].generation, 2);
        assert!(facade.on_heartbeat(start + chrono::Duration::seconds(60)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_delay_arms_on_every_backend() {
        let (tx, mut rx) = scheduler_channel();
        let start = Utc::now();
        let service = ManualService::default();
        let mut facade =
            BackgroundTimerFacade::with_service(Box::new(service.clone()), tx.clone(), Arc::new(ManualClock::new(start)));

        let handle = facade.arm(Uuid::new_v4(), 1, 1e20);
        assert_eq!(*service.scheduled.lock().unwrap(), vec![(handle, Duration::MAX)]);
        assert!(facade.on_heartbeat(start + chrono::Duration::days(365)).is_empty());
        assert_eq!(facade.pending_count(), 1);

        let mut local = BackgroundTimerFacade::new(&TimerOptions::local_only(), tx, Arc::new(SystemClock));
        local.arm(Uuid::new_v4(), 1, 1e20);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(local.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_prefers_delegated_then_heartbeat() {
        let (tx, _rx) = scheduler_channel();
        let facade = BackgroundTimerFacade::new(&TimerOptions::default(), tx.clone(), Arc::new(SystemClock));
        assert_eq!(facade.backend(), TimerBackendKind::Delegated);

        let options = TimerOptions {
            delegated_timer: false,
            worker_heartbeat: true,
            heartbeat_interval: Duration::from_millis(20),
        };
        let facade = BackgroundTimerFacade::new(&options, tx, Arc::new(SystemClock));
        assert_eq!(facade.backend(), TimerBackendKind::WorkerHeartbeat);
    }

    #[tokio::test]
    async fn test_heartbeats_reach_scheduler_channel() {
        let (tx, mut rx) = scheduler_channel();
        let options = TimerOptions {
            delegated_timer: false,
            worker_heartbeat: true,
            heartbeat_interval: Duration::from_millis(10),
        };
        let _facade = BackgroundTimerFacade::new(&options, tx, Arc::new(SystemClock));

        let input = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert!(matches!(input, Some(SchedulerInput::Heartbeat(_))));
    }
}
