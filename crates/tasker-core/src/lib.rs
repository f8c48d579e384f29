//! `tasker-core`: types, configuration, and the repository seam shared by
//! every tasker crate.

pub mod config;
pub mod error;
pub mod repository;
pub mod types;

pub use error::{Result, TaskerError};
pub use repository::TaskRepository;
pub use types::{
    ExecutionId, ExecutionStatus, NewExecution, NewTask, Task, TaskExecution, TaskId, TaskStatus,
    TaskUpdate,
};
