use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task not found: {id}")]
    TaskNotFound { id: String },

    #[error("Execution not found: {id}")]
    ExecutionNotFound { id: String },

    /// A bulk history operation named rows the caller does not own (or that
    /// do not exist), so nothing was touched.
    #[error("Execution ownership mismatch: {requested} requested, {matched} matched")]
    ExecutionOwnershipMismatch { requested: usize, matched: usize },

    #[error("Invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TaskerError {
    /// Short error code string sent to HTTP clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            TaskerError::Config(_) => "CONFIG_ERROR",
            TaskerError::TaskNotFound { .. } => "TASK_NOT_FOUND",
            TaskerError::ExecutionNotFound { .. } => "EXECUTION_NOT_FOUND",
            TaskerError::ExecutionOwnershipMismatch { .. } => "FORBIDDEN",
            TaskerError::InvalidSchedule { .. } => "INVALID_SCHEDULE",
            TaskerError::InvalidRequest(_) => "INVALID_REQUEST",
            TaskerError::Database(_) => "DATABASE_ERROR",
            TaskerError::Serialization(_) => "SERIALIZATION_ERROR",
            TaskerError::Io(_) => "IO_ERROR",
            TaskerError::Timeout { .. } => "TIMEOUT",
            TaskerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for the "row is gone" family, which callers usually recover from.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TaskerError::TaskNotFound { .. } | TaskerError::ExecutionNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TaskerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let err = TaskerError::TaskNotFound { id: "t1".into() };
        assert_eq!(err.code(), "TASK_NOT_FOUND");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Task not found: t1");

        let err = TaskerError::ExecutionOwnershipMismatch { requested: 3, matched: 2 };
        assert_eq!(err.code(), "FORBIDDEN");
        assert!(!err.is_not_found());
    }
}
