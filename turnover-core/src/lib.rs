//! turnover-core: cleaning-task scheduling engine for short-stay properties.
//!
//! Pure and synchronous. Storage, booking feeds and notifications live in
//! `turnover-ingest` and `turnover-service`.

pub mod booking;
pub mod calendar;
pub mod cleaner;
pub mod derive;
pub mod distribution;
pub mod error;
pub mod link_token;
pub mod reconcile;
pub mod relocation;
pub mod task;
pub mod throttle;

pub use booking::{Booking, BookingStatus};
pub use calendar::{DateRange, Month, parse_iso_date};
pub use cleaner::{Availability, Cleaner, parse_available_dates};
pub use derive::{NoTaskReason, derive_task, derive_tasks};
pub use distribution::{
    DistributionPlan, PlannedAssignment, SkipReason, SkippedTask, plan_fair_distribution,
};
pub use error::{ScheduleError, ScheduleResult};
pub use link_token::{LinkClaims, LinkSigner, TokenError};
pub use reconcile::{Discrepancy, ReconcilePlan, ids_to_probe, plan_reconciliation};
pub use relocation::{
    DEFAULT_HORIZON_DAYS, LegalDates, MAX_HORIZON_DAYS, RelocationPolicy, RelocationValidator,
    WindowBound,
};
pub use task::{CleaningTask, task_id};
pub use throttle::FetchThrottle;
