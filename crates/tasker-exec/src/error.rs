//! Error types for the tasker-exec crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    /// The shell could not be started.
    #[error("spawn failed: {0}")]
    Spawn(#[source] std::io::Error),

    /// Waiting on the child or reading its pipes failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The task collecting the child's output went away without reporting.
    #[error("output collector lost: {0}")]
    Collector(String),
}

pub type Result<T> = std::result::Result<T, ExecError>;
