use tasker_core::TaskerError;
use tasker_queue::QueueError;
use thiserror::Error;

/// Errors that can occur within the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The repository rejected a read or write.
    #[error(transparent)]
    Repository(#[from] TaskerError),

    /// The execution queue refused a submission or is closed.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("task not found: {id}")]
    TaskNotFound { id: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

impl From<SchedulerError> for TaskerError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::Repository(inner) => inner,
            SchedulerError::Queue(inner) => TaskerError::Internal(inner.to_string()),
            SchedulerError::TaskNotFound { id } => TaskerError::TaskNotFound { id },
        }
    }
}
