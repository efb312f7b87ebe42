//! Cleaning task model.
//!
//! A task's identity is `{original_checkout_date}_{booking_id}` and never
//! changes, no matter how often the task is relocated.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Compose the stable task id for a booking's checkout.
pub fn task_id(original_checkout: NaiveDate, booking_id: &str) -> String {
    format!("{}_{}", original_checkout.format("%Y-%m-%d"), booking_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningTask {
    pub id: String,

    /// Checkout date when the task was created. Immutable; the anchor for
    /// every relocation decision.
    #[serde(alias = "originalCleaningDate", alias = "originalBookingDate")]
    pub original_checkout_date: NaiveDate,

    pub current_cleaning_date: NaiveDate,
    pub booking_id: String,
    pub guest_name: String,

    #[serde(default)]
    pub cleaner_id: Option<String>,
    #[serde(default)]
    pub cleaner_name: Option<String>,

    #[serde(default, alias = "bookingDateChanged")]
    pub relocated: bool,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CleaningTask {
    /// Unassigned task scheduled on its own checkout day.
    pub fn skeleton(
        original_checkout_date: NaiveDate,
        booking_id: impl Into<String>,
        guest_name: impl Into<String>,
    ) -> Self {
        let booking_id = booking_id.into();
        Self {
            id: task_id(original_checkout_date, &booking_id),
            original_checkout_date,
            current_cleaning_date: original_checkout_date,
            booking_id,
            guest_name: guest_name.into(),
            cleaner_id: None,
            cleaner_name: None,
            relocated: false,
            updated_at: None,
        }
    }

    pub fn anchor(&self) -> NaiveDate {
        self.original_checkout_date
    }

    pub fn is_assigned(&self) -> bool {
        self.cleaner_id.is_some()
    }

    pub fn assign(&mut self, cleaner_id: impl Into<String>, cleaner_name: impl Into<String>) {
        self.cleaner_id = Some(cleaner_id.into());
        self.cleaner_name = Some(cleaner_name.into());
    }

    pub fn unassign(&mut self) {
        self.cleaner_id = None;
        self.cleaner_name = None;
    }

    /// Move the scheduled date. Callers gate this through the relocation
    /// validator; the `relocated` flag tracks divergence from the anchor.
    pub fn schedule_on(&mut self, date: NaiveDate) {
        self.current_cleaning_date = date;
        self.relocated = date != self.original_checkout_date;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }
}
