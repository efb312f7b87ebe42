//! Canonical booking shape, as handed to the core by the ingest adapter.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Confirmed,
    Pending,
    Cancelled,
}

/// A guest stay. The guest occupies `[check_in, check_out)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_name: String,
    #[serde(default = "default_cleaning_required")]
    pub cleaning_required: bool,
    #[serde(default)]
    pub status: BookingStatus,
}

fn default_cleaning_required() -> bool {
    true
}

impl Booking {
    pub fn new(
        id: impl Into<String>,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guest_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            check_in,
            check_out,
            guest_name: guest_name.into(),
            cleaning_required: true,
            status: BookingStatus::Confirmed,
        }
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn without_cleaning(mut self) -> Self {
        self.cleaning_required = false;
        self
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.id.trim().is_empty() {
            return Err(ScheduleError::validation("booking id must be non-empty"));
        }
        if self.check_in >= self.check_out {
            return Err(ScheduleError::validation(format!(
                "booking {}: check-in {} is not before checkout {}",
                self.id, self.check_in, self.check_out
            )));
        }
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }

    /// True when `date` lies strictly inside the stay. The check-in and
    /// checkout days themselves are free for cleaning.
    pub fn occupies(&self, date: NaiveDate) -> bool {
        self.check_in < date && date < self.check_out
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn occupancy_excludes_arrival_and_departure_days() {
        let b = Booking::new("y", d("2025-08-12"), d("2025-08-15"), "Yuki");
        assert!(!b.occupies(d("2025-08-12")));
        assert!(b.occupies(d("2025-08-13")));
        assert!(b.occupies(d("2025-08-14")));
        assert!(!b.occupies(d("2025-08-15")));
        assert_eq!(b.nights(), 3);
    }

    #[test]
    fn validate_rejects_inverted_stays() {
        let b = Booking::new("x", d("2025-08-10"), d("2025-08-10"), "Same day");
        assert!(b.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let b: Booking = serde_json::from_str(
            r#"{"id":"b1","checkIn":"2025-08-01","checkOut":"2025-08-03","guestName":"Ann"}"#,
        )
        .unwrap();
        assert!(b.cleaning_required);
        assert_eq!(b.status, BookingStatus::Confirmed);
    }
}
