//! The queue processor: runs one task's command and records the outcome.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tasker_core::{ExecutionId, ExecutionStatus, NewExecution, TaskId, TaskRepository, TaskUpdate};
use tasker_exec::{CommandOutput, ShellRunner};
use tasker_queue::{JobFailure, JobId, JobPayload, JobProcessor};
use tracing::{info, instrument, warn};

use crate::timers::TimerRegistry;

/// What caused a job to be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Schedule,
    Manual,
}

/// Queue payload: run this task once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskJob {
    pub task_id: TaskId,
    pub trigger: Trigger,
}

impl JobPayload for TaskJob {
    fn completion_key(&self) -> Option<&str> {
        Some(self.task_id.as_str())
    }
}

/// Result of a successful run, as seen by queue waiters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub execution_id: Option<ExecutionId>,
    pub status: ExecutionStatus,
    pub duration_ms: i64,
    pub exit_code: Option<i32>,
}

/// Marks a task as running for as long as it lives.
struct InProgress<'a> {
    set: &'a DashSet<TaskId>,
    task_id: TaskId,
}

impl<'a> InProgress<'a> {
    fn enter(set: &'a DashSet<TaskId>, task_id: &TaskId) -> Self {
        set.insert(task_id.clone());
        Self {
            set,
            task_id: task_id.clone(),
        }
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.task_id);
    }
}

pub(crate) struct TaskRunner {
    pub(crate) repo: Arc<dyn TaskRepository>,
    pub(crate) shell: ShellRunner,
    pub(crate) in_progress: Arc<DashSet<TaskId>>,
    pub(crate) timers: Arc<Mutex<TimerRegistry>>,
}

impl TaskRunner {
    fn live_next_run(&self, task_id: &TaskId) -> Option<chrono::DateTime<Utc>> {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_run(task_id)
    }
}

#[async_trait]
impl JobProcessor<TaskJob, ExecutionReport> for TaskRunner {
    #[instrument(skip(self, job), fields(task_id = %job.task_id, trigger = ?job.trigger))]
    async fn process(
        &self,
        job_id: &JobId,
        job: TaskJob,
    ) -> std::result::Result<ExecutionReport, JobFailure> {
        let _running = InProgress::enter(&self.in_progress, &job.task_id);

        let task = match self.repo.find_by_id(&job.task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!(%job_id, "task vanished before it could run");
                return Err(JobFailure(format!("task not found: {}", job.task_id)));
            }
            Err(e) => return Err(JobFailure(e.to_string())),
        };

        let start_time = Utc::now();
        let result = self.shell.run(&task.command).await;
        let end_time = Utc::now();

        let (status, output, error, exit_code) = match result {
            Ok(out) => classify(out),
            Err(e) => (ExecutionStatus::Error, String::new(), Some(e.to_string()), None),
        };

        let record = NewExecution {
            task_id: task.id.clone(),
            start_time,
            end_time,
            status,
            output,
            error: error.clone(),
        };
        let duration_ms = record.duration_ms();
        let execution_id = match self.repo.create_execution(record).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(%job_id, error = %e, "failed to record execution");
                None
            }
        };

        let update = TaskUpdate {
            last_run: Some(start_time),
            last_status: Some(status.task_status()),
            next_run: self.live_next_run(&task.id).map(Some),
            ..TaskUpdate::default()
        };
        if let Err(e) = self.repo.update(&task.id, update).await {
            warn!(%job_id, error = %e, "failed to update task after run");
        }

        info!(%job_id, %status, duration_ms, "task run finished");

        match error {
            Some(message) if status != ExecutionStatus::Success => Err(JobFailure(message)),
            _ => Ok(ExecutionReport {
                execution_id,
                status,
                duration_ms,
                exit_code,
            }),
        }
    }
}

/// Map a finished command to history fields. Failures always carry a
/// non-empty error message.
fn classify(out: CommandOutput) -> (ExecutionStatus, String, Option<String>, Option<i32>) {
    if out.success() {
        let stderr = (!out.stderr.is_empty()).then_some(out.stderr);
        return (ExecutionStatus::Success, out.stdout, stderr, out.exit_code);
    }

    let status = if out.timed_out {
        ExecutionStatus::Timeout
    } else {
        ExecutionStatus::Error
    };
    let message = if !out.stderr.trim().is_empty() {
        out.stderr
    } else if out.timed_out {
        "command timed out".to_string()
    } else {
        match out.exit_code {
            Some(code) => format!("command exited with status {code}"),
            None => "command terminated by signal".to_string(),
        }
    };
    (status, out.stdout, Some(message), out.exit_code)
}
