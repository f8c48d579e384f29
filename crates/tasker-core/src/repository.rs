//! Data-access seam between the scheduler and whatever persists tasks.
//!
//! The scheduler only ever needs these four operations. `tasker-store`
//! provides the SQLite implementation; tests may supply their own.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ExecutionId, NewExecution, Task, TaskId, TaskUpdate};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// All tasks with `is_active = true`.
    async fn find_active_tasks(&self) -> Result<Vec<Task>>;

    /// `Ok(None)` when the task has been deleted.
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>>;

    /// Apply a partial update and return the row as stored afterwards.
    ///
    /// Fails with `TaskerError::TaskNotFound` if the row does not exist.
    async fn update(&self, id: &TaskId, fields: TaskUpdate) -> Result<Task>;

    /// Append one execution history row.
    async fn create_execution(&self, record: NewExecution) -> Result<ExecutionId>;
}
