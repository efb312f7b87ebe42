use chrono::NaiveDate;
use thiserror::Error;

/// Error taxonomy shared by every scheduling operation.
///
/// Conflicts (an occupied target, a record that already exists) are not
/// errors; they come back as ordinary outcomes from the operation itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Malformed input to an operation. Never partially applied.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested target is outside the task's legal relocation set.
    #[error("task {task_id} cannot be moved to {target}")]
    IllegalRelocation { task_id: String, target: NaiveDate },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Transient store failure; the caller decides whether to retry.
    #[error("store error: {0}")]
    Store(String),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

impl ScheduleError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    pub fn task_not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound {
            kind: "task",
            id: id.into(),
        }
    }

    pub fn cleaner_not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound {
            kind: "cleaner",
            id: id.into(),
        }
    }

    pub fn booking_not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound {
            kind: "booking",
            id: id.into(),
        }
    }

    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ScheduleError::Store(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ScheduleError::NotFound { .. })
    }
}
