//! Visibility reconciler
//!
//! Maintains the persisted [`ExpectedBoundaryRecord`] and, when the client
//! becomes visible again (or the process restarts), decides whether a
//! boundary was crossed while every timer was suspended.
//!
//! A record is consumed by the check that finds it due, so it triggers at
//! most one catch-up.

use crate::scheduler::FailureKind;
use crate::state::SharedState;
use segloop_common::db::{load_json, store_json, KeyValueStore, EXPECTED_BOUNDARY_KEY};
use segloop_common::time::{deadline_after, WallClock};
use segloop_common::{ExpectedBoundaryRecord, Segment, SegmentId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a reconciliation check
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Nothing persisted
    NoRecord,
    /// Record belonged to another segment and was deleted
    Stale,
    /// Record could not be decoded and was deleted
    Corrupt,
    /// Boundary not reached yet; record kept
    Pending(ExpectedBoundaryRecord),
    /// Boundary passed; record deleted, caller should act once
    Due(ExpectedBoundaryRecord),
}

pub struct VisibilityReconciler {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn WallClock>,
    state: Arc<SharedState>,
}

impl VisibilityReconciler {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn WallClock>, state: Arc<SharedState>) -> Self {
        Self { store, clock, state }
    }

    /// Compare the persisted record against the live segment
    pub async fn reconcile(&self, live: Option<SegmentId>) -> ReconcileOutcome {
        let record = match load_json::<ExpectedBoundaryRecord>(self.store.as_ref(), EXPECTED_BOUNDARY_KEY).await {
            Ok(Some(record)) => record,
            Ok(None) => return ReconcileOutcome::NoRecord,
            Err(e) => {
                warn!("Discarding unreadable boundary record: {}", e);
                self.state.record_failure(FailureKind::PersistenceCorrupt);
                self.clear().await;
                return ReconcileOutcome::Corrupt;
            }
        };

        if live != Some(record.segment_id) {
            debug!("Boundary record for {} is stale (live {:?})", record.segment_id, live);
            self.clear().await;
            return ReconcileOutcome::Stale;
        }

        let now = self.clock.now();
        if record.is_due(now) {
            info!(
                "Boundary of {} passed {}ms ago while unattended",
                record.segment_id,
                (now - record.expected_end_wall_clock).num_milliseconds()
            );
            self.clear().await;
            ReconcileOutcome::Due(record)
        } else {
            ReconcileOutcome::Pending(record)
        }
    }

    /// Persist "`segment` ends `remaining_seconds` from now"
    pub async fn record_boundary(&self, segment: &Segment, remaining_seconds: f64) -> Option<ExpectedBoundaryRecord> {
        let now = self.clock.now();
        let record = ExpectedBoundaryRecord {
            segment_id: segment.id,
            source_id: segment.source_id.clone(),
            expected_end_wall_clock: deadline_after(now, remaining_seconds),
            recorded_at: now,
        };

        // Persistence failures only cost the catch-up path
        match store_json(self.store.as_ref(), EXPECTED_BOUNDARY_KEY, &record).await {
            Ok(()) => {
                debug!(
                    "Recorded boundary of {} at {}",
                    segment.id,
                    record.expected_end_wall_clock.to_rfc3339()
                );
                Some(record)
            }
            Err(e) => {
                warn!("Failed to persist boundary record: {}", e);
                None
            }
        }
    }

    /// Delete the record, if any
    pub async fn clear(&self) {
        if let Err(e) = self.store.remove(EXPECTED_BOUNDARY_KEY).await {
            warn!("Failed to delete boundary record: {}", e);
        }
    }
}
