//! Cleaning task derivation: booking -> zero or one task skeleton.
//!
//! The composite id is the idempotence mechanism. Deriving twice from the
//! same booking yields the same id, so an upsert keyed by id can never
//! duplicate a task.

use std::collections::HashSet;

use crate::booking::Booking;
use crate::task::CleaningTask;

/// Why a booking produced no task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoTaskReason {
    Cancelled,
    CleaningNotRequired,
}

pub fn derive_task(booking: &Booking) -> Result<CleaningTask, NoTaskReason> {
    if booking.is_cancelled() {
        return Err(NoTaskReason::Cancelled);
    }
    if !booking.cleaning_required {
        return Err(NoTaskReason::CleaningNotRequired);
    }
    Ok(CleaningTask::skeleton(
        booking.check_out,
        booking.id.clone(),
        booking.guest_name.clone(),
    ))
}

/// Derive every qualifying task, dropping repeated ids (first wins).
pub fn derive_tasks(bookings: &[Booking]) -> Vec<CleaningTask> {
    let mut seen = HashSet::new();
    bookings
        .iter()
        .filter_map(|b| derive_task(b).ok())
        .filter(|t| seen.insert(t.id.clone()))
        .collect()
}
