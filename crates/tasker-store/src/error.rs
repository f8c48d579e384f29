use tasker_core::TaskerError;
use thiserror::Error;

/// Errors that can occur during task and history persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    #[error("execution not found: {id}")]
    ExecutionNotFound { id: String },

    /// Bulk delete named rows that are missing or owned by someone else.
    #[error("{matched} of {requested} executions matched")]
    OwnershipMismatch { requested: usize, matched: usize },

    /// Filter or pagination parameters out of range.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for TaskerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(e) => TaskerError::Database(e.to_string()),
            StoreError::TaskNotFound { id } => TaskerError::TaskNotFound { id },
            StoreError::ExecutionNotFound { id } => TaskerError::ExecutionNotFound { id },
            StoreError::OwnershipMismatch { requested, matched } => {
                TaskerError::ExecutionOwnershipMismatch { requested, matched }
            }
            StoreError::InvalidFilter(msg) => TaskerError::InvalidRequest(msg),
        }
    }
}
