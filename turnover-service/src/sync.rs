//! Reconciliation syncer: make sure every qualifying booking has a task
//! record, without touching records that already exist.
//!
//! Steps:
//! 1) probe the store for every candidate task id, in chunks no larger than
//!    the store's batch ceiling
//! 2) diff against the booking snapshot (pure, in turnover-core)
//! 3) create each missing record independently; one failed write never
//!    stops the rest and nothing is rolled back
//! 4) flag stale records (cancelled, no cleaning, moved checkout); these
//!    are derived from the snapshot every run, not just when a task is new
//!
//! Re-running with the same snapshot is always safe.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use turnover_core::{
    Booking, Discrepancy, ScheduleError, derive_task, ids_to_probe, plan_reconciliation,
};

use crate::store::{TaskPatch, TaskQuery, TaskStore, exists_chunked};

/// One write that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedWrite {
    pub task_id: String,
    pub error: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub created: Vec<String>,
    pub already_present: usize,
    pub failed: Vec<FailedWrite>,
    pub discrepancies: Vec<Discrepancy>,
}

impl SyncReport {
    pub fn summary(&self) -> String {
        format!(
            "sync: created {}, already present {}, failed {}, discrepancies {}",
            self.created.len(),
            self.already_present,
            self.failed.len(),
            self.discrepancies.len()
        )
    }
}

pub struct ReconciliationSyncer {
    store: Arc<dyn TaskStore>,
}

impl ReconciliationSyncer {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Reconcile the store against one de-duplicated booking snapshot.
    ///
    /// A failed existence probe aborts the run (nothing was written yet);
    /// failed creates are reported per task.
    pub async fn sync(&self, bookings: &[Booking]) -> Result<SyncReport, ScheduleError> {
        let probe = ids_to_probe(bookings);
        let existing = exists_chunked(self.store.as_ref(), &probe).await?;
        debug!(probed = probe.len(), existing = existing.len(), "existence probe done");

        let plan = plan_reconciliation(bookings, &existing);
        let mut report = SyncReport {
            already_present: plan.already_present.len(),
            discrepancies: plan.discrepancies,
            ..Default::default()
        };

        for task in &plan.to_create {
            match self.store.upsert(&task.id, &TaskPatch::skeleton(task)).await {
                Ok(_) => {
                    debug!(task_id = %task.id, "task created");
                    report.created.push(task.id.clone());
                }
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "task create failed");
                    report.failed.push(FailedWrite {
                        task_id: task.id.clone(),
                        retryable: e.is_retryable(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.flag_moved_checkouts(bookings, &mut report).await;

        for d in &report.discrepancies {
            warn!(task_id = d.task_id(), discrepancy = ?d, "task needs operator review");
        }
        info!("{}", report.summary());
        Ok(report)
    }

    /// Every stored task of a qualifying booking whose id is not the one
    /// its current checkout derives is stale. Recomputed on each run, so a
    /// moved checkout stays flagged until an operator deals with it.
    async fn flag_moved_checkouts(&self, bookings: &[Booking], report: &mut SyncReport) {
        let mut seen = HashSet::new();
        for task in bookings.iter().filter_map(|b| derive_task(b).ok()) {
            if !seen.insert(task.id.clone()) {
                continue;
            }
            match self.store.query(&TaskQuery::BookingId(task.booking_id.clone())).await {
                Ok(siblings) => {
                    for stale in siblings.into_iter().filter(|t| t.id != task.id) {
                        report.discrepancies.push(Discrepancy::CheckoutMoved {
                            stale_task_id: stale.id,
                            booking_id: task.booking_id.clone(),
                            current_task_id: task.id.clone(),
                        });
                    }
                }
                Err(e) => warn!(booking_id = %task.booking_id, error = %e, "stale-task lookup failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTaskStore;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn probe_failure_aborts_before_writing() {
        let store = Arc::new(InMemoryTaskStore::new());
        store.set_reads_down(true);
        let syncer = ReconciliationSyncer::new(store.clone());
        let err = syncer
            .sync(&[Booking::new("a", d("2025-08-01"), d("2025-08-03"), "A")])
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        store.set_reads_down(false);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn moved_checkout_is_flagged_not_deleted() {
        let store = Arc::new(InMemoryTaskStore::new());
        let syncer = ReconciliationSyncer::new(store.clone());

        syncer
            .sync(&[Booking::new("a", d("2025-08-01"), d("2025-08-03"), "A")])
            .await
            .unwrap();
        let report = syncer
            .sync(&[Booking::new("a", d("2025-08-01"), d("2025-08-05"), "A")])
            .await
            .unwrap();

        assert_eq!(report.created, vec!["2025-08-05_a".to_string()]);
        assert_eq!(
            report.discrepancies,
            vec![Discrepancy::CheckoutMoved {
                stale_task_id: "2025-08-03_a".into(),
                booking_id: "a".into(),
                current_task_id: "2025-08-05_a".into(),
            }]
        );
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn moved_checkout_stays_flagged_on_later_runs() {
        let store = Arc::new(InMemoryTaskStore::new());
        let syncer = ReconciliationSyncer::new(store.clone());
        let moved = [Booking::new("a", d("2025-08-01"), d("2025-08-05"), "A")];

        syncer
            .sync(&[Booking::new("a", d("2025-08-01"), d("2025-08-03"), "A")])
            .await
            .unwrap();
        syncer.sync(&moved).await.unwrap();
        let again = syncer.sync(&moved).await.unwrap();

        assert!(again.created.is_empty());
        assert_eq!(again.already_present, 1);
        assert_eq!(
            again.discrepancies,
            vec![Discrepancy::CheckoutMoved {
                stale_task_id: "2025-08-03_a".into(),
                booking_id: "a".into(),
                current_task_id: "2025-08-05_a".into(),
            }]
        );
    }
}
