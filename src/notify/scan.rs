//! Overdue scan: drive every overdue candidate through the gate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::gate::{NotificationGate, NotificationKind, NotifyOutcome};
use crate::error::DatabaseError;
use crate::store::TaskStore;

/// Tally of one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Candidates driven through the gate.
    pub processed: usize,
    pub delivered: usize,
    /// Lost a race or no longer eligible on re-check.
    pub skipped: usize,
    /// Claimed, but the mailer failed.
    pub delivery_failed: usize,
    /// Store error while processing the task.
    pub errors: usize,
}

/// Selects overdue candidates and notifies each one independently.
pub struct OverdueScan {
    store: Arc<dyn TaskStore>,
    gate: Arc<NotificationGate>,
}

impl OverdueScan {
    pub fn new(store: Arc<dyn TaskStore>, gate: Arc<NotificationGate>) -> Self {
        Self { store, gate }
    }

    /// Run one scan at `now`.
    ///
    /// Fails only if the candidate query itself fails. A failure on one
    /// task is counted and logged and the batch carries on.
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<ScanReport, DatabaseError> {
        let candidates = self.store.list_overdue_candidates(now).await?;
        let mut report = ScanReport::default();

        for task in candidates {
            report.processed += 1;
            match self
                .gate
                .try_mark_and_send(task.id, NotificationKind::Overdue, now)
                .await
            {
                Ok(NotifyOutcome::Delivered) => report.delivered += 1,
                Ok(NotifyOutcome::Skipped(_)) => report.skipped += 1,
                Ok(NotifyOutcome::DeliveryFailed(_)) => report.delivery_failed += 1,
                Err(e) => {
                    warn!(task_id = task.id, error = %e, "Overdue notification failed");
                    report.errors += 1;
                }
            }
        }

        if report.processed > 0 {
            info!(
                processed = report.processed,
                delivered = report.delivered,
                skipped = report.skipped,
                delivery_failed = report.delivery_failed,
                errors = report.errors,
                "Overdue scan complete"
            );
        }
        Ok(report)
    }
}
