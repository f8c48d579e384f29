use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-chosen identifier of a queued job. Unique within one queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Data carried by a job.
pub trait JobPayload: Clone + Send + Sync + 'static {
    /// Groups jobs for keyed completion and in-flight checks. Jobs without a
    /// key are only reachable by their id.
    fn completion_key(&self) -> Option<&str> {
        None
    }
}

/// Error returned by a [`JobProcessor`]. Recorded verbatim on the job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct JobFailure(pub String);

impl From<String> for JobFailure {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobFailure {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The single handler installed on a queue.
#[async_trait]
pub trait JobProcessor<P, O>: Send + Sync + 'static {
    async fn process(&self, job_id: &JobId, payload: P) -> Result<O, JobFailure>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState<O> {
    Waiting,
    Active,
    Completed(O),
    Failed(String),
}

impl<O> JobState<O> {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Waiting => JobStatus::Waiting,
            JobState::Active => JobStatus::Active,
            JobState::Completed(_) => JobStatus::Completed,
            JobState::Failed(_) => JobStatus::Failed,
        }
    }

    /// Waiting or active.
    pub fn is_pending(&self) -> bool {
        matches!(self, JobState::Waiting | JobState::Active)
    }
}

/// State without the result, for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one job.
#[derive(Debug, Clone)]
pub struct QueueJob<P, O> {
    pub id: JobId,
    pub payload: P,
    pub state: JobState<O>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Job counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}
