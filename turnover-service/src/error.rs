use thiserror::Error;
use turnover_core::ScheduleError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(String),

    /// Timeout or outage. Safe to retry the whole operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store data corrupt: {0}")]
    Corrupt(String),

    #[error("batch of {got} ids exceeds the store limit of {limit}")]
    BatchTooLarge { got: usize, limit: usize },

    /// A create-through-upsert was missing a field the record needs.
    #[error("cannot create task {id}: missing {field}")]
    Incomplete { id: String, field: &'static str },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<StoreError> for ScheduleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ScheduleError::task_not_found(id),
            StoreError::Incomplete { .. } => ScheduleError::validation(e.to_string()),
            other => ScheduleError::store(other.to_string()),
        }
    }
}
