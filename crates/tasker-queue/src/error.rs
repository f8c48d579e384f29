use thiserror::Error;

/// Errors surfaced by [`crate::ExecutionQueue`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was closed; no further jobs run and pending waiters wake.
    #[error("queue closed")]
    Closed,

    #[error("a processor is already installed")]
    ProcessorAlreadySet,

    #[error("job already exists: {id}")]
    DuplicateJob { id: String },

    #[error("job not found: {id}")]
    UnknownJob { id: String },

    /// The processor returned an error or panicked.
    #[error("job failed: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;
