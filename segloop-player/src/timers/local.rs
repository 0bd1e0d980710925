//! Local timeout on the scheduler's own runtime
//!
//! Last-resort backend: subject to whatever throttling the runtime suffers.

use super::TimerHandle;
use crate::scheduler::{SchedulerInput, SchedulerSender};
use std::time::Duration;
use tokio::task::JoinHandle;

pub(super) fn spawn_timeout(handle: TimerHandle, after: Duration, tx: SchedulerSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = tx.send(SchedulerInput::TimerFired(handle));
    })
}
