//! Task store repository.
//!
//! The store is the single shared mutable resource. Every write is a merge:
//! fields a patch leaves unset are never touched, and `original_checkout_date`
//! / `booking_id` are only written when the record is first created.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use turnover_core::{CleaningTask, DateRange};

use crate::error::{StoreError, StoreResult};

pub mod file;
pub mod memory;

pub use file::JsonFileTaskStore;
pub use memory::InMemoryTaskStore;

/// Ceiling most document stores put on one batched read.
pub const DEFAULT_MAX_BATCH: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskQuery {
    /// Current cleaning date within the range, inclusive.
    CleaningDateBetween(DateRange),
    CleaningDateOn(NaiveDate),
    BookingId(String),
    /// Tasks currently assigned to this cleaner.
    CleanerId(String),
}

impl TaskQuery {
    pub fn matches(&self, task: &CleaningTask) -> bool {
        match self {
            TaskQuery::CleaningDateBetween(r) => r.contains(task.current_cleaning_date),
            TaskQuery::CleaningDateOn(d) => task.current_cleaning_date == *d,
            TaskQuery::BookingId(id) => task.booking_id == *id,
            TaskQuery::CleanerId(id) => task.cleaner_id.as_deref() == Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedCleaner {
    pub id: String,
    pub name: String,
}

/// Field-level merge write. `None` leaves a field alone; `cleaner:
/// Some(None)` clears the assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub booking_id: Option<String>,
    pub original_checkout_date: Option<NaiveDate>,
    pub current_cleaning_date: Option<NaiveDate>,
    pub guest_name: Option<String>,
    pub cleaner: Option<Option<AssignedCleaner>>,
}

impl TaskPatch {
    /// Identity fields of a derived task, for create-if-missing writes.
    /// Leaves the schedule and the cleaner alone, so merging it into an
    /// existing record cannot undo a relocation or an assignment.
    pub fn skeleton(task: &CleaningTask) -> Self {
        Self {
            booking_id: Some(task.booking_id.clone()),
            original_checkout_date: Some(task.original_checkout_date),
            current_cleaning_date: None,
            guest_name: Some(task.guest_name.clone()),
            cleaner: None,
        }
    }

    pub fn assign(cleaner_id: impl Into<String>, cleaner_name: impl Into<String>) -> Self {
        Self {
            cleaner: Some(Some(AssignedCleaner {
                id: cleaner_id.into(),
                name: cleaner_name.into(),
            })),
            ..Default::default()
        }
    }

    pub fn unassign() -> Self {
        Self {
            cleaner: Some(None),
            ..Default::default()
        }
    }

    pub fn reschedule(date: NaiveDate) -> Self {
        Self {
            current_cleaning_date: Some(date),
            ..Default::default()
        }
    }

    /// Merge into an existing record and stamp it.
    pub fn apply(&self, task: &mut CleaningTask) {
        if let Some(date) = self.current_cleaning_date {
            task.schedule_on(date);
        }
        if let Some(name) = &self.guest_name {
            task.guest_name = name.clone();
        }
        match &self.cleaner {
            Some(Some(c)) => task.assign(c.id.clone(), c.name.clone()),
            Some(None) => task.unassign(),
            None => {}
        }
        task.touch(Utc::now());
    }

    /// Build a new record from the patch. Needs at least the booking id and
    /// the original checkout date.
    pub fn create(&self, id: &str) -> StoreResult<CleaningTask> {
        let incomplete = |field| StoreError::Incomplete {
            id: id.to_string(),
            field,
        };
        let booking_id = self.booking_id.clone().ok_or_else(|| incomplete("bookingId"))?;
        let anchor = self
            .original_checkout_date
            .ok_or_else(|| incomplete("originalCheckoutDate"))?;

        let mut task = CleaningTask::skeleton(anchor, booking_id, "");
        // the caller's id wins; it is the document key
        task.id = id.to_string();
        self.apply(&mut task);
        Ok(task)
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, id: &str) -> StoreResult<Option<CleaningTask>>;

    /// Matching tasks ordered by (current cleaning date, id).
    async fn query(&self, query: &TaskQuery) -> StoreResult<Vec<CleaningTask>>;

    /// Subset of `ids` that exist. `ids.len()` must not exceed
    /// `max_batch_size()`; use [`exists_chunked`] for arbitrary lists.
    async fn batch_exists(&self, ids: &[String]) -> StoreResult<HashSet<String>>;

    fn max_batch_size(&self) -> usize {
        DEFAULT_MAX_BATCH
    }

    /// Merge-write, creating the record when it is missing.
    async fn upsert(&self, id: &str, patch: &TaskPatch) -> StoreResult<CleaningTask>;

    /// Merge-write into an existing record; `NotFound` when it is missing.
    async fn update(&self, id: &str, patch: &TaskPatch) -> StoreResult<CleaningTask>;
}

/// Existence check over any number of ids, one store call per chunk of at
/// most `max_batch_size()` ids.
pub async fn exists_chunked<S: TaskStore + ?Sized>(
    store: &S,
    ids: &[String],
) -> StoreResult<HashSet<String>> {
    let chunk = store.max_batch_size().max(1);
    let mut found = HashSet::new();
    for part in ids.chunks(chunk) {
        found.extend(store.batch_exists(part).await?);
    }
    Ok(found)
}

pub(crate) fn sort_tasks(tasks: &mut [CleaningTask]) {
    tasks.sort_by(|a, b| {
        a.current_cleaning_date
            .cmp(&b.current_cleaning_date)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn apply_keeps_relocated_flag_consistent() {
        let mut t = CleaningTask::skeleton(d("2025-08-10"), "b1", "Sato");
        TaskPatch::reschedule(d("2025-08-11")).apply(&mut t);
        assert!(t.relocated);
        TaskPatch::reschedule(d("2025-08-10")).apply(&mut t);
        assert!(!t.relocated);
        assert!(t.updated_at.is_some());
    }

    #[test]
    fn skeleton_patch_never_touches_manual_edits() {
        let t = CleaningTask::skeleton(d("2025-08-10"), "b1", "Sato");
        let p = TaskPatch::skeleton(&t);
        assert_eq!(p.cleaner, None);

        let mut edited = t.clone();
        edited.assign("c1", "Alice");
        edited.schedule_on(d("2025-08-12"));
        p.apply(&mut edited);
        assert_eq!(edited.cleaner_id.as_deref(), Some("c1"));
        assert_eq!(edited.current_cleaning_date, d("2025-08-12"));
        assert!(edited.relocated);
    }

    #[test]
    fn create_requires_identity_fields() {
        assert!(matches!(
            TaskPatch::assign("c1", "Alice").create("x"),
            Err(StoreError::Incomplete { field: "bookingId", .. })
        ));

        let t = CleaningTask::skeleton(d("2025-08-10"), "b1", "Sato");
        let created = TaskPatch::skeleton(&t).create(&t.id).unwrap();
        assert_eq!(created.id, t.id);
        assert_eq!(created.guest_name, "Sato");
        assert!(!created.relocated);
    }
}
