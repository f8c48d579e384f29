//! `tasker-queue`: in-memory execution queue with bounded concurrency.
//!
//! Jobs are submitted with a caller-chosen id and move through
//! `Waiting → Active → Completed | Failed`. A single [`JobProcessor`] runs
//! them. Callers can wait on a specific job id, or on the next job carrying
//! a given completion key via [`ExecutionQueue::completion_for`].

pub mod completion;
pub mod error;
pub mod job;
pub mod queue;

pub use completion::Completion;
pub use error::{QueueError, Result};
pub use job::{
    JobFailure, JobId, JobPayload, JobProcessor, JobState, JobStatus, QueueJob, QueueStats,
};
pub use queue::{ExecutionQueue, QueueOptions, DEFAULT_POLL_INTERVAL};
