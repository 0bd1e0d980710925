//! Client visibility signal
//!
//! The page hosting the player reports whether it is visible through
//! `POST /visibility`. Transitions are forwarded to the scheduler, which
//! refreshes the boundary record on hide and reconciles on show.

use crate::scheduler::{SchedulerInput, SchedulerSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Clone)]
pub struct VisibilitySignal {
    tx: watch::Sender<bool>,
}

impl VisibilitySignal {
    /// Starts out visible
    pub fn new() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx }
    }

    /// Record the current visibility; returns whether it changed
    pub fn set(&self, visible: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == visible {
                false
            } else {
                *current = visible;
                true
            }
        })
    }

    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Forward transitions to the scheduler until either side goes away
    pub fn forward_to(&self, scheduler: SchedulerSender) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let visible = *rx.borrow_and_update();
                debug!("Client is now {}", if visible { "visible" } else { "hidden" });
                if scheduler.send(SchedulerInput::Visibility(visible)).is_err() {
                    break;
                }
            }
        })
    }
}

impl Default for VisibilitySignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::scheduler_channel;

    #[test]
    fn test_set_reports_changes_only() {
        let signal = VisibilitySignal::new();
        assert!(signal.is_visible());
        assert!(!signal.set(true));
        assert!(signal.set(false));
        assert!(!signal.is_visible());
        assert!(!signal.set(false));
    }

    #[tokio::test]
    async fn test_forwards_transitions() {
        let signal = VisibilitySignal::new();
        let (tx, mut rx) = scheduler_channel();
        let _task = signal.forward_to(tx);

        signal.set(false);
        assert_eq!(rx.recv().await, Some(SchedulerInput::Visibility(false)));
        signal.set(true);
        assert_eq!(rx.recv().await, Some(SchedulerInput::Visibility(true)));
    }
}
