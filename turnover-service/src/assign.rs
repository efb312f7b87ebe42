//! Cleaner assignment: manual assign/unassign and the fair-distribution run.
//!
//! Every write goes through [`write_self_healing`]: when the task record is
//! missing, it is recreated from booking data and the write is retried once.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use turnover_core::{
    Booking, CleaningTask, DistributionPlan, Month, PlannedAssignment, ScheduleError,
    derive_task, plan_fair_distribution, task_id,
};

use crate::error::StoreError;
use crate::roster::{AvailabilitySource, CleanerDirectory, month_availability};
use crate::store::{TaskPatch, TaskQuery, TaskStore};
use crate::sync::FailedWrite;

/// Rebuild the skeleton a booking snapshot implies for `id`.
pub fn recreate_from_bookings(id: &str, bookings: &[Booking]) -> Result<CleaningTask, ScheduleError> {
    bookings
        .iter()
        .find(|b| task_id(b.check_out, &b.id) == id)
        .and_then(|b| derive_task(b).ok())
        .ok_or_else(|| ScheduleError::task_not_found(id))
}

/// Update `id`; on `NotFound`, create it from `bookings` and retry once.
/// Returns the written record and whether it had to be recreated.
pub async fn write_self_healing(
    store: &dyn TaskStore,
    id: &str,
    patch: &TaskPatch,
    bookings: &[Booking],
) -> Result<(CleaningTask, bool), ScheduleError> {
    match store.update(id, patch).await {
        Ok(task) => Ok((task, false)),
        Err(StoreError::NotFound(_)) => {
            let skeleton = recreate_from_bookings(id, bookings)?;
            info!(task_id = id, "task record missing, recreating from booking data");
            store.upsert(id, &TaskPatch::skeleton(&skeleton)).await?;
            let task = store.update(id, patch).await?;
            Ok((task, true))
        }
        Err(e) => Err(e.into()),
    }
}

pub struct AssignmentService {
    store: Arc<dyn TaskStore>,
    cleaners: Arc<dyn CleanerDirectory>,
}

impl AssignmentService {
    pub fn new(store: Arc<dyn TaskStore>, cleaners: Arc<dyn CleanerDirectory>) -> Self {
        Self { store, cleaners }
    }

    pub async fn assign(
        &self,
        task_id: &str,
        cleaner_id: &str,
        bookings: &[Booking],
    ) -> Result<CleaningTask, ScheduleError> {
        let cleaner = self
            .cleaners
            .get_cleaner(cleaner_id)
            .await?
            .ok_or_else(|| ScheduleError::cleaner_not_found(cleaner_id))?;
        if !cleaner.is_active {
            return Err(ScheduleError::validation(format!(
                "cleaner {cleaner_id} is inactive"
            )));
        }

        let patch = TaskPatch::assign(&cleaner.id, &cleaner.name);
        let (task, healed) =
            write_self_healing(self.store.as_ref(), task_id, &patch, bookings).await?;
        info!(task_id, cleaner_id, healed, "cleaner assigned");
        Ok(task)
    }

    pub async fn unassign(
        &self,
        task_id: &str,
        bookings: &[Booking],
    ) -> Result<CleaningTask, ScheduleError> {
        let (task, healed) =
            write_self_healing(self.store.as_ref(), task_id, &TaskPatch::unassign(), bookings)
                .await?;
        info!(task_id, healed, "cleaner unassigned");
        Ok(task)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionReport {
    pub month: Option<Month>,
    pub plan: DistributionPlan,
    pub persisted: Vec<PlannedAssignment>,
    pub failed: Vec<FailedWrite>,
    /// Task ids whose record had to be recreated before the write landed.
    pub healed: Vec<String>,
}

impl DistributionReport {
    pub fn summary(&self) -> String {
        format!(
            "{}; persisted {}, failed {}, recreated {}",
            self.plan.summary(),
            self.persisted.len(),
            self.failed.len(),
            self.healed.len()
        )
    }
}

pub struct FairDistributionRunner {
    store: Arc<dyn TaskStore>,
    cleaners: Arc<dyn CleanerDirectory>,
    availability: Arc<dyn AvailabilitySource>,
}

impl FairDistributionRunner {
    pub fn new(
        store: Arc<dyn TaskStore>,
        cleaners: Arc<dyn CleanerDirectory>,
        availability: Arc<dyn AvailabilitySource>,
    ) -> Self {
        Self {
            store,
            cleaners,
            availability,
        }
    }

    /// Plan and persist a fair distribution for `month`.
    ///
    /// Reads (tasks, roster, availability) must all succeed; after that each
    /// assignment is written on its own and reported on its own.
    pub async fn run(
        &self,
        month: Month,
        bookings: &[Booking],
    ) -> Result<DistributionReport, ScheduleError> {
        let period = month.range();
        let tasks = self.store.query(&TaskQuery::CleaningDateBetween(period)).await?;
        let cleaners = self.cleaners.list_cleaners().await?;
        let availability = month_availability(self.availability.as_ref(), &cleaners, month).await?;

        let plan = plan_fair_distribution(&tasks, &cleaners, &availability, period);
        info!(
            %month,
            open = plan.assignments.len() + plan.skipped.len(),
            "fair distribution planned"
        );
        for s in &plan.skipped {
            info!(task_id = %s.task_id, date = %s.date, "no cleaner available, left open");
        }

        let mut report = DistributionReport {
            month: Some(month),
            ..Default::default()
        };

        for a in &plan.assignments {
            let patch = TaskPatch::assign(&a.cleaner_id, &a.cleaner_name);
            match write_self_healing(self.store.as_ref(), &a.task_id, &patch, bookings).await {
                Ok((_, healed)) => {
                    info!(task_id = %a.task_id, cleaner_id = %a.cleaner_id, healed, "assignment persisted");
                    if healed {
                        report.healed.push(a.task_id.clone());
                    }
                    report.persisted.push(a.clone());
                }
                Err(e) => {
                    warn!(task_id = %a.task_id, error = %e, "assignment failed");
                    report.failed.push(FailedWrite {
                        task_id: a.task_id.clone(),
                        retryable: e.is_retryable(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.plan = plan;
        info!("{}", report.summary());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::InMemoryRoster;
    use crate::store::InMemoryTaskStore;
    use chrono::NaiveDate;
    use turnover_core::Cleaner;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn assign_recreates_missing_record_once() {
        let store = Arc::new(InMemoryTaskStore::new());
        let roster = Arc::new(InMemoryRoster::new(vec![Cleaner::new("c1", "Alice")]));
        let svc = AssignmentService::new(store.clone(), roster);
        let bookings = vec![Booking::new("b1", d("2025-08-07"), d("2025-08-10"), "Sato")];

        let task = svc.assign("2025-08-10_b1", "c1", &bookings).await.unwrap();
        assert_eq!(task.cleaner_name.as_deref(), Some("Alice"));
        assert_eq!(task.guest_name, "Sato");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn assign_without_booking_data_is_not_found() {
        let store = Arc::new(InMemoryTaskStore::new());
        let roster = Arc::new(InMemoryRoster::new(vec![Cleaner::new("c1", "Alice")]));
        let svc = AssignmentService::new(store.clone(), roster);
        let err = svc.assign("2025-08-10_zz", "c1", &[]).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_or_inactive_cleaner_is_rejected() {
        let store = Arc::new(InMemoryTaskStore::new());
        let roster = Arc::new(InMemoryRoster::new(vec![Cleaner::new("c2", "Bob").inactive()]));
        let svc = AssignmentService::new(store, roster);
        let bookings = vec![Booking::new("b1", d("2025-08-07"), d("2025-08-10"), "Sato")];

        assert_eq!(
            svc.assign("2025-08-10_b1", "nobody", &bookings).await.unwrap_err(),
            ScheduleError::cleaner_not_found("nobody")
        );
        assert!(matches!(
            svc.assign("2025-08-10_b1", "c2", &bookings).await,
            Err(ScheduleError::Validation(_))
        ));
    }
}
