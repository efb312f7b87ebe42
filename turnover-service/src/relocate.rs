//! Date moves for cleaning tasks, gated by the relocation validator.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};
use turnover_core::{
    Booking, CleaningTask, LegalDates, RelocationPolicy, RelocationValidator, ScheduleError,
};

use crate::assign::{recreate_from_bookings, write_self_healing};
use crate::store::{TaskPatch, TaskStore};

pub struct RelocationService {
    store: Arc<dyn TaskStore>,
    policy: RelocationPolicy,
}

impl RelocationService {
    pub fn new(store: Arc<dyn TaskStore>, policy: RelocationPolicy) -> Self {
        Self { store, policy }
    }

    /// Stored task, or the skeleton the bookings imply when the record is
    /// missing. Only the anchor and booking id matter for validation.
    async fn load(&self, task_id: &str, bookings: &[Booking]) -> Result<CleaningTask, ScheduleError> {
        match self.store.get(task_id).await? {
            Some(task) => Ok(task),
            None => recreate_from_bookings(task_id, bookings),
        }
    }

    pub async fn legal_dates(
        &self,
        task_id: &str,
        bookings: &[Booking],
    ) -> Result<LegalDates, ScheduleError> {
        let task = self.load(task_id, bookings).await?;
        let legal = RelocationValidator::new(bookings, self.policy).legal_dates(&task);
        debug!(task_id, legal = legal.len(), draggable = legal.is_draggable(), "legal dates");
        Ok(legal)
    }

    /// Move a task to `target`. Nothing is written unless the target is in
    /// the legal set computed from the task's anchor.
    pub async fn relocate(
        &self,
        task_id: &str,
        target: NaiveDate,
        bookings: &[Booking],
    ) -> Result<CleaningTask, ScheduleError> {
        let task = self.load(task_id, bookings).await?;
        RelocationValidator::new(bookings, self.policy).check_move(&task, target)?;

        let (moved, healed) = write_self_healing(
            self.store.as_ref(),
            task_id,
            &TaskPatch::reschedule(target),
            bookings,
        )
        .await?;
        info!(
            task_id,
            from = %task.current_cleaning_date,
            to = %target,
            relocated = moved.relocated,
            healed,
            "task relocated"
        );
        Ok(moved)
    }

    /// Move a task back to its original checkout date. Always legal.
    pub async fn revert(&self, task_id: &str, bookings: &[Booking]) -> Result<CleaningTask, ScheduleError> {
        let task = self.load(task_id, bookings).await?;
        self.relocate(task_id, task.anchor(), bookings).await
    }
}
