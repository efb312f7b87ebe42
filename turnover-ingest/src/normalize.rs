//! Booking adapter: typed reservation shapes -> canonical `Booking`.
//!
//! Rules:
//! - id is required; a record without one is rejected, never given a made-up id
//! - dates may carry a time suffix (`2025-08-10T15:00:00+09:00`); only the day counts
//! - `cleaning_required` defaults to true, an explicit false is honoured
//! - missing guest name becomes "Unknown Guest"
//! - status vocabulary from the aggregator folds into confirmed/pending/cancelled
//! - duplicates by booking id collapse; the last occurrence wins, keeping
//!   the position of the first

use std::collections::HashMap;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;
use tracing::warn;
use turnover_core::{Booking, BookingStatus};

use crate::types::{CamelReservation, RawReservation, SnakeReservation};

pub const UNKNOWN_GUEST: &str = "Unknown Guest";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("reservation has no id")]
    MissingId,
    #[error("reservation {id}: missing {field}")]
    MissingField { id: String, field: &'static str },
    #[error("reservation {id}: unparseable date '{value}'")]
    BadDate { id: String, value: String },
    #[error("reservation {id}: check-in {check_in} is not before checkout {check_out}")]
    InvertedStay {
        id: String,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
}

/// Flattened view both shapes reduce to before validation.
struct Fields {
    id: Option<String>,
    check_in: Option<String>,
    check_out: Option<String>,
    guest_name: Option<String>,
    cleaning_required: Option<bool>,
    status: Option<String>,
}

impl From<&CamelReservation> for Fields {
    fn from(r: &CamelReservation) -> Self {
        Self {
            id: r.id.clone().map(|id| id.into_string()),
            check_in: Some(r.check_in.clone()),
            check_out: r.check_out.clone(),
            guest_name: r.guest_name.clone(),
            cleaning_required: r.cleaning_required,
            status: r.status.clone(),
        }
    }
}

impl From<&SnakeReservation> for Fields {
    fn from(r: &SnakeReservation) -> Self {
        Self {
            id: r
                .id
                .clone()
                .map(|id| id.into_string())
                .or_else(|| r.reservation_code.clone()),
            check_in: r.check_in.clone().or_else(|| r.check_in_date.clone()),
            check_out: r.check_out.clone().or_else(|| r.check_out_date.clone()),
            guest_name: r.guest_name.clone(),
            cleaning_required: r.cleaning_required,
            status: r.status.clone(),
        }
    }
}

/// Map aggregator status words onto the three states the core knows.
pub fn parse_status(raw: Option<&str>) -> BookingStatus {
    let Some(s) = raw.map(|s| s.trim().to_ascii_lowercase()) else {
        return BookingStatus::Confirmed;
    };
    match s.as_str() {
        "cancelled" | "canceled" | "denied" | "declined" | "expired" => BookingStatus::Cancelled,
        "pending" | "inquiry" | "request" => BookingStatus::Pending,
        s if s.starts_with("wait") => BookingStatus::Pending,
        _ => BookingStatus::Confirmed,
    }
}

pub struct Normalizer {
    date_re: Regex,
}

impl Normalizer {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            date_re: Regex::new(r"^\s*(\d{4}-\d{2}-\d{2})")?,
        })
    }

    fn parse_date(&self, id: &str, value: &str) -> Result<NaiveDate, NormalizeError> {
        let bad = || NormalizeError::BadDate {
            id: id.to_string(),
            value: value.to_string(),
        };
        let caps = self.date_re.captures(value).ok_or_else(bad)?;
        NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").map_err(|_| bad())
    }

    pub fn normalize(&self, raw: &RawReservation) -> Result<Booking, NormalizeError> {
        let f = match raw {
            RawReservation::Camel(r) => Fields::from(r),
            RawReservation::Snake(r) => Fields::from(r),
        };

        let id = f
            .id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(NormalizeError::MissingId)?;

        let missing = |field| NormalizeError::MissingField {
            id: id.clone(),
            field,
        };
        let check_in = f
            .check_in
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| missing("checkIn"))?;
        let check_out = f
            .check_out
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| missing("checkOut"))?;

        let check_in = self.parse_date(&id, &check_in)?;
        let check_out = self.parse_date(&id, &check_out)?;
        if check_in >= check_out {
            return Err(NormalizeError::InvertedStay {
                id,
                check_in,
                check_out,
            });
        }

        let guest_name = f
            .guest_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_GUEST.to_string());

        Ok(Booking {
            id,
            check_in,
            check_out,
            guest_name,
            cleaning_required: f.cleaning_required.unwrap_or(true),
            status: parse_status(f.status.as_deref()),
        })
    }

    /// Normalize a whole feed page set into a de-duplicated snapshot.
    pub fn normalize_all(&self, raws: &[RawReservation]) -> NormalizedSnapshot {
        let mut bookings: Vec<Booking> = Vec::new();
        let mut position: HashMap<String, usize> = HashMap::new();
        let mut rejected = Vec::new();

        for raw in raws {
            match self.normalize(raw) {
                Ok(b) => match position.get(&b.id) {
                    Some(&i) => bookings[i] = b,
                    None => {
                        position.insert(b.id.clone(), bookings.len());
                        bookings.push(b);
                    }
                },
                Err(e) => {
                    warn!(error = %e, "rejected reservation");
                    rejected.push(e);
                }
            }
        }

        NormalizedSnapshot { bookings, rejected }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedSnapshot {
    pub bookings: Vec<Booking>,
    pub rejected: Vec<NormalizeError>,
}
