//! Reconciliation diff between the live booking list and stored task ids.
//!
//! Strictly additive: the plan only ever lists tasks to create. Records
//! that already exist are left alone, and tasks whose booking stopped
//! qualifying are surfaced as discrepancies for an operator, never deleted.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::booking::Booking;
use crate::derive::{NoTaskReason, derive_task};
use crate::task::{CleaningTask, task_id};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    /// A task exists for a booking that is now cancelled.
    BookingCancelled { task_id: String, booking_id: String },
    /// A task exists for a booking that no longer asks for cleaning.
    CleaningNoLongerRequired { task_id: String, booking_id: String },
    /// The booking's checkout moved; the old task is stale.
    CheckoutMoved {
        stale_task_id: String,
        booking_id: String,
        current_task_id: String,
    },
}

impl Discrepancy {
    pub fn task_id(&self) -> &str {
        match self {
            Discrepancy::BookingCancelled { task_id, .. } => task_id,
            Discrepancy::CleaningNoLongerRequired { task_id, .. } => task_id,
            Discrepancy::CheckoutMoved { stale_task_id, .. } => stale_task_id,
        }
    }
}

/// Ids the syncer must probe in the store for one booking snapshot:
/// every derivable task id plus the ids non-qualifying bookings would have
/// had, so stale records can be flagged.
pub fn ids_to_probe(bookings: &[Booking]) -> Vec<String> {
    let mut seen = HashSet::new();
    bookings
        .iter()
        .map(|b| task_id(b.check_out, &b.id))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub to_create: Vec<CleaningTask>,
    pub already_present: Vec<String>,
    pub discrepancies: Vec<Discrepancy>,
}

pub fn plan_reconciliation(bookings: &[Booking], existing: &HashSet<String>) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();
    let mut seen = HashSet::new();

    for booking in bookings {
        let id = task_id(booking.check_out, &booking.id);
        if !seen.insert(id.clone()) {
            continue;
        }

        match derive_task(booking) {
            Ok(task) if existing.contains(&task.id) => plan.already_present.push(task.id),
            Ok(task) => plan.to_create.push(task),
            Err(reason) if existing.contains(&id) => {
                let booking_id = booking.id.clone();
                plan.discrepancies.push(match reason {
                    NoTaskReason::Cancelled => Discrepancy::BookingCancelled { task_id: id, booking_id },
                    NoTaskReason::CleaningNotRequired => {
                        Discrepancy::CleaningNoLongerRequired { task_id: id, booking_id }
                    }
                });
            }
            Err(_) => {}
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingStatus;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn creates_only_missing_tasks() {
        let bookings = vec![
            Booking::new("a", d("2025-08-01"), d("2025-08-04"), "A"),
            Booking::new("b", d("2025-08-05"), d("2025-08-08"), "B"),
        ];
        let existing: HashSet<String> = ["2025-08-04_a".to_string()].into_iter().collect();

        let plan = plan_reconciliation(&bookings, &existing);
        assert_eq!(plan.already_present, vec!["2025-08-04_a".to_string()]);
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_create[0].id, "2025-08-08_b");
        assert!(plan.discrepancies.is_empty());
    }

    #[test]
    fn flags_but_keeps_tasks_of_cancelled_bookings() {
        let bookings = vec![
            Booking::new("a", d("2025-08-01"), d("2025-08-04"), "A").with_status(BookingStatus::Cancelled),
            Booking::new("c", d("2025-08-01"), d("2025-08-06"), "C").with_status(BookingStatus::Cancelled),
        ];
        let existing: HashSet<String> = ["2025-08-04_a".to_string()].into_iter().collect();

        let plan = plan_reconciliation(&bookings, &existing);
        assert!(plan.to_create.is_empty());
        assert_eq!(
            plan.discrepancies,
            vec![Discrepancy::BookingCancelled {
                task_id: "2025-08-04_a".to_string(),
                booking_id: "a".to_string(),
            }]
        );
    }

    #[test]
    fn probe_ids_cover_non_qualifying_bookings_once() {
        let b = Booking::new("n", d("2025-08-01"), d("2025-08-03"), "N").without_cleaning();
        let ids = ids_to_probe(&[b.clone(), b]);
        assert_eq!(ids, vec!["2025-08-03_n".to_string()]);
    }
}
