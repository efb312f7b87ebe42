//! turnover-service: the async side of the scheduler. Task repository,
//! reconciliation, cleaner assignment, relocation, availability links and
//! notifications, all against injected stores.

pub mod assign;
pub mod cleaners;
pub mod error;
mod json_file;
pub mod links;
pub mod listing;
pub mod notify;
pub mod relocate;
pub mod roster;
pub mod store;
pub mod sync;

pub use assign::{
    AssignmentService, DistributionReport, FairDistributionRunner, recreate_from_bookings,
    write_self_healing,
};
pub use cleaners::{CleanerAdmin, CleanerUpdate};
pub use error::{StoreError, StoreResult};
pub use links::{AvailabilityLinks, IssuedLink, LinkError};
pub use listing::{Listing, list_month};
pub use notify::{
    LineNotifier, LogNotifier, Notifier, NotifyError, NotifyReport, send_assignment_notice,
    send_monthly_schedules,
};
pub use relocate::RelocationService;
pub use roster::{
    AvailabilitySource, CleanerDirectory, InMemoryRoster, JsonFileRoster, month_availability,
};
pub use store::{
    InMemoryTaskStore, JsonFileTaskStore, TaskPatch, TaskQuery, TaskStore, exists_chunked,
};
pub use sync::{FailedWrite, ReconciliationSyncer, SyncReport};
