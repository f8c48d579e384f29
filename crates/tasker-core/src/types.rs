use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a task (UUIDv7, time-sortable, so listings and logs
/// line up with creation order).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for one row of execution history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ExecutionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ExecutionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Outcome of the most recent run, as stored on the task row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Success => "success",
            TaskStatus::Error => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(TaskStatus::Success),
            "error" => Ok(TaskStatus::Error),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A user-registered shell command with its cron schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    /// Tenant that owns the task. Opaque to the scheduler.
    pub owner_id: String,
    pub name: String,
    /// Passed verbatim to the system shell.
    pub command: String,
    /// Cron expression: 5 fields, or 6 with a leading seconds field.
    pub schedule: String,
    pub is_active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub last_status: Option<TaskStatus>,
    /// Always `None` while `is_active` is false.
    pub next_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to register a new task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub name: String,
    pub command: String,
    pub schedule: String,
    #[serde(default = "bool_true")]
    pub is_active: bool,
    #[serde(default = "default_owner")]
    pub owner_id: String,
}

fn bool_true() -> bool {
    true
}

fn default_owner() -> String {
    "default".to_string()
}

/// Partial update of a task row. `None` leaves the column untouched.
///
/// `next_run` is doubly optional: `Some(None)` explicitly clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub command: Option<String>,
    /// Callers re-arm the task's timer after changing this.
    pub schedule: Option<String>,
    pub is_active: Option<bool>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_status: Option<TaskStatus>,
    pub next_run: Option<Option<DateTime<Utc>>>,
}

impl TaskUpdate {
    pub fn active(is_active: bool) -> Self {
        Self {
            is_active: Some(is_active),
            ..Self::default()
        }
    }

    pub fn next_run(next_run: Option<DateTime<Utc>>) -> Self {
        Self {
            next_run: Some(next_run),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Final status of one command run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Success,
    Error,
    /// Killed after exceeding the executor's hard timeout.
    Timeout,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Error => "ERROR",
            ExecutionStatus::Timeout => "TIMEOUT",
        }
    }

    /// The coarser status recorded on the task row.
    pub fn task_status(&self) -> TaskStatus {
        match self {
            ExecutionStatus::Success => TaskStatus::Success,
            ExecutionStatus::Error | ExecutionStatus::Timeout => TaskStatus::Error,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(ExecutionStatus::Success),
            "ERROR" => Ok(ExecutionStatus::Error),
            "TIMEOUT" => Ok(ExecutionStatus::Timeout),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// One persisted command run. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExecution {
    pub id: ExecutionId,
    pub task_id: TaskId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub status: ExecutionStatus,
    /// Captured stdout.
    pub output: String,
    /// Captured stderr or a failure message. Never empty unless `status` is
    /// `Success`.
    pub error: Option<String>,
}

/// A history row about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExecution {
    pub task_id: TaskId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub output: String,
    pub error: Option<String>,
}

impl NewExecution {
    pub fn duration_ms(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds()
    }
}
