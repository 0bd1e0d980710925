//! Foreground position monitor
//!
//! While a segment plays, the engine position is polled at a fixed interval.
//! Each sample is reported to the scheduler; the first sample at or past the
//! end offset raises one boundary signal and ends the task.

use crate::engine::PlaybackEngine;
use crate::scheduler::{BoundarySignal, SchedulerInput, SchedulerSender};
use segloop_common::events::BoundarySource;
use segloop_common::models::Generation;
use segloop_common::SegmentId;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

pub struct SegmentMonitor {
    poll_interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl SegmentMonitor {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            task: None,
        }
    }

    /// Start polling for one generation of a segment, replacing any
    /// previous poll task
    pub fn start(
        &mut self,
        engine: Arc<dyn PlaybackEngine>,
        segment_id: SegmentId,
        generation: Generation,
        end_offset: Option<f64>,
        tx: SchedulerSender,
    ) {
        self.stop();
        debug!("Monitoring segment {} gen {} (end {:?})", segment_id, generation, end_offset);
        self.task = Some(tokio::spawn(poll_position(
            engine,
            segment_id,
            generation,
            end_offset,
            self.poll_interval,
            tx,
        )));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SegmentMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_position(
    engine: Arc<dyn PlaybackEngine>,
    segment_id: SegmentId,
    generation: Generation,
    end_offset: Option<f64>,
    poll_interval: Duration,
    tx: SchedulerSender,
) {
    let mut interval = time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let position = match engine.current_position() {
            Ok(position) => position,
            Err(e) => {
                debug!("Position unavailable: {}", e);
                continue;
            }
        };

        let sample = SchedulerInput::PositionSampled {
            segment_id,
            generation,
            position,
        };
        if tx.send(sample).is_err() {
            return;
        }

        if let Some(end) = end_offset {
            if position >= end {
                debug!("Monitor saw boundary of {} at {:.3}s (end {:.3}s)", segment_id, position, end);
                let _ = tx.send(SchedulerInput::Boundary(BoundarySignal {
                    segment_id,
                    generation,
                    source: BoundarySource::Monitor,
                }));
                return;
            }
        }
    }
}
