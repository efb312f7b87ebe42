//! Which dates a cleaning task may be moved to.
//!
//! Every computation is anchored to the task's *original* checkout date,
//! never its current position. That keeps the destination set stable no
//! matter how many times the task has moved, and the anchor itself is
//! always a member so any move can be undone.
//!
//! Window:
//! - next booking (other than the task's own) with the earliest check-in on
//!   or after the anchor bounds the window at its check-in day, inclusive
//!   (cleaning happens before the guest arrives)
//! - with no later booking the window runs `horizon_days` past the anchor,
//!   capped at [`MAX_HORIZON_DAYS`] and at the last representable date
//!
//! Inside the window a date is blocked when it falls strictly inside some
//! other active stay. Check-in and checkout days are never blocked.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::booking::Booking;
use crate::error::ScheduleError;
use crate::task::CleaningTask;

pub const DEFAULT_HORIZON_DAYS: u32 = 30;
pub const MAX_HORIZON_DAYS: u32 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationPolicy {
    /// How far past the anchor a task may float when no later booking exists.
    pub horizon_days: u32,
}

impl RelocationPolicy {
    /// Horizon actually applied; larger configured values are clamped.
    pub fn effective_horizon_days(&self) -> u32 {
        self.horizon_days.min(MAX_HORIZON_DAYS)
    }

    /// Last day of an open-ended window starting at `anchor`.
    pub fn horizon_end(&self, anchor: NaiveDate) -> NaiveDate {
        anchor
            .checked_add_days(Days::new(u64::from(self.effective_horizon_days())))
            .unwrap_or(NaiveDate::MAX)
    }
}

impl Default for RelocationPolicy {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }
}

/// What closes the relocation window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowBound {
    NextCheckIn { booking_id: String, date: NaiveDate },
    Horizon(NaiveDate),
}

impl WindowBound {
    pub fn date(&self) -> NaiveDate {
        match self {
            WindowBound::NextCheckIn { date, .. } => *date,
            WindowBound::Horizon(date) => *date,
        }
    }
}

/// Result of a validation pass for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegalDates {
    pub anchor: NaiveDate,
    pub bound: WindowBound,
    /// Legal targets, always including the anchor.
    dates: BTreeSet<NaiveDate>,
    /// Window dates rejected because another stay covers them (date -> booking id).
    blocked: BTreeMap<NaiveDate, String>,
}

impl LegalDates {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    /// All legal dates, anchor included, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }

    /// Legal dates other than the anchor.
    pub fn targets(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let anchor = self.anchor;
        self.dates.iter().copied().filter(move |d| *d != anchor)
    }

    /// A task with nothing but its anchor is fixed in place.
    pub fn is_draggable(&self) -> bool {
        self.targets().next().is_some()
    }

    pub fn blocked(&self) -> &BTreeMap<NaiveDate, String> {
        &self.blocked
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Validator over one snapshot of the booking list. Rebuild it whenever
/// the booking list changes.
#[derive(Debug, Clone)]
pub struct RelocationValidator<'a> {
    bookings: Vec<&'a Booking>,
    policy: RelocationPolicy,
}

impl<'a> RelocationValidator<'a> {
    /// Cancelled bookings are dropped; they neither occupy dates nor bound
    /// a window.
    pub fn new(bookings: &'a [Booking], policy: RelocationPolicy) -> Self {
        Self {
            bookings: bookings.iter().filter(|b| !b.is_cancelled()).collect(),
            policy,
        }
    }

    pub fn policy(&self) -> RelocationPolicy {
        self.policy
    }

    pub fn legal_dates(&self, task: &CleaningTask) -> LegalDates {
        self.legal_dates_from(task.anchor(), &task.booking_id)
    }

    /// Legal set for an anchor date, ignoring the booking that owns the task.
    pub fn legal_dates_from(&self, anchor: NaiveDate, own_booking_id: &str) -> LegalDates {
        let others: Vec<&Booking> = self
            .bookings
            .iter()
            .copied()
            .filter(|b| b.id != own_booking_id)
            .collect();

        let bound = next_check_in(&others, anchor)
            .map(|b| WindowBound::NextCheckIn {
                booking_id: b.id.clone(),
                date: b.check_in,
            })
            .unwrap_or_else(|| WindowBound::Horizon(self.policy.horizon_end(anchor)));

        let mut dates = BTreeSet::new();
        let mut blocked = BTreeMap::new();

        let end = bound.date();
        for day in anchor.iter_days().skip(1).take_while(|d| *d <= end) {
            match others.iter().find(|b| b.occupies(day)) {
                Some(b) => {
                    blocked.insert(day, b.id.clone());
                }
                None => {
                    dates.insert(day);
                }
            }
        }

        // Revert target, re-added unconditionally.
        dates.insert(anchor);

        LegalDates {
            anchor,
            bound,
            dates,
            blocked,
        }
    }

    /// Gate for every date change on a task.
    pub fn check_move(&self, task: &CleaningTask, target: NaiveDate) -> Result<(), ScheduleError> {
        if self.legal_dates(task).contains(target) {
            Ok(())
        } else {
            Err(ScheduleError::IllegalRelocation {
                task_id: task.id.clone(),
                target,
            })
        }
    }
}

fn next_check_in<'b>(others: &[&'b Booking], anchor: NaiveDate) -> Option<&'b Booking> {
    others
        .iter()
        .copied()
        .filter(|b| b.check_in >= anchor)
        .min_by(|a, b| a.check_in.cmp(&b.check_in).then_with(|| a.id.cmp(&b.id)))
}
