use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tasker_core::config::ScheduleTimezone;
use tasker_core::{Task, TaskId, TaskRepository, TaskUpdate};
use tasker_cron::CronExpression;
use tasker_exec::ShellRunner;
use tasker_queue::{ExecutionQueue, JobId, QueueError, QueueOptions, QueueStats};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{Result, SchedulerError};
use crate::options::SchedulerOptions;
use crate::runner::{ExecutionReport, TaskJob, TaskRunner, Trigger};
use crate::timers::{TimerId, TimerRegistry};

/// Outcome of [`Scheduler::execute_task_now`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunNowResult {
    pub success: bool,
    /// The task as persisted after the run, when it still exists.
    pub task: Option<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The wait gave up before the run finished. The run itself continues.
    pub timed_out: bool,
}

impl RunNowResult {
    fn failure(task: Option<Task>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            task,
            error: Some(error.into()),
            timed_out: false,
        }
    }
}

struct Inner {
    repo: Arc<dyn TaskRepository>,
    queue: ExecutionQueue<TaskJob, ExecutionReport>,
    timers: Arc<Mutex<TimerRegistry>>,
    next_timer: AtomicU64,
    in_progress: Arc<DashSet<TaskId>>,
    /// Serializes the in-flight check with the submit.
    submit_gate: Mutex<()>,
    initialized: AtomicBool,
    /// Serializes start/stop.
    lifecycle: tokio::sync::Mutex<()>,
    janitor: Mutex<Option<JoinHandle<()>>>,
    clock: Arc<dyn Clock>,
    options: SchedulerOptions,
}

/// Keeps one timer per active task and funnels fires through the
/// execution queue.
///
/// Construct once at startup and share by cloning; clones are handles to the
/// same scheduler. Must be created inside a Tokio runtime.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        repo: Arc<dyn TaskRepository>,
        options: SchedulerOptions,
        shell: ShellRunner,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let queue = ExecutionQueue::new(
            "task-execution",
            QueueOptions {
                concurrency: options.concurrency,
                poll_interval: options.poll_interval,
            },
        );
        let timers = Arc::new(Mutex::new(TimerRegistry::default()));
        let in_progress = Arc::new(DashSet::new());

        queue.set_processor(TaskRunner {
            repo: Arc::clone(&repo),
            shell,
            in_progress: Arc::clone(&in_progress),
            timers: Arc::clone(&timers),
        })?;

        Ok(Self {
            inner: Arc::new(Inner {
                repo,
                queue,
                timers,
                next_timer: AtomicU64::new(1),
                in_progress,
                submit_gate: Mutex::new(()),
                initialized: AtomicBool::new(false),
                lifecycle: tokio::sync::Mutex::new(()),
                janitor: Mutex::new(None),
                clock,
                options,
            }),
        })
    }

    /// Arm (or re-arm) the task's timer and return its first fire instant.
    ///
    /// Any existing timer is cancelled first, even when the new schedule
    /// turns out to be invalid. Invalid or never-firing schedules are logged
    /// and leave the task unscheduled.
    #[instrument(skip(self, task), fields(task_id = %task.id, schedule = %task.schedule))]
    pub fn schedule_task(&self, task: &Task) -> Option<DateTime<Utc>> {
        self.cancel_task(&task.id);

        let expr = match CronExpression::parse(&task.schedule) {
            Ok(expr) => expr,
            Err(e) => {
                warn!(error = %e, "invalid schedule, task not scheduled");
                return None;
            }
        };
        let Some(first) = self.inner.next_fire(&expr, &self.inner.clock.now()) else {
            warn!("schedule never fires, task not scheduled");
            return None;
        };

        let timer_id = TimerId(self.inner.next_timer.fetch_add(1, Ordering::Relaxed));
        let mut timers = self.inner.timers();
        let handle = tokio::spawn(run_timer(
            Arc::downgrade(&self.inner),
            timer_id,
            task.id.clone(),
            expr,
            first,
        ));
        timers.insert(timer_id, task.id.clone(), first, handle);
        debug!(%timer_id, next_run = %first, "timer armed");
        Some(first)
    }

    /// Disarm the task's timer. No-op when none is armed. A run already
    /// queued or executing is left alone.
    pub fn cancel_task(&self, task_id: &TaskId) {
        if let Some(timer_id) = self.inner.timers().remove_task(task_id) {
            debug!(%task_id, %timer_id, "timer cancelled");
        }
    }

    /// Next fire instant of the task's live timer.
    pub fn get_next_run(&self, task_id: &TaskId) -> Option<DateTime<Utc>> {
        self.inner.timers().next_run(task_id)
    }

    pub fn scheduled_count(&self) -> usize {
        self.inner.timers().len()
    }

    /// Run a task immediately and wait (bounded) for the outcome.
    ///
    /// Never fails: problems are reported in the result. If the task is
    /// already queued or running, waits briefly and returns its current
    /// state instead of starting a second run.
    #[instrument(skip_all, fields(task_id = %task_id))]
    pub async fn execute_task_now(&self, task_id: &TaskId) -> RunNowResult {
        let inner = &self.inner;
        match inner.repo.find_by_id(task_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return RunNowResult::failure(None, format!("task not found: {task_id}")),
            Err(e) => return RunNowResult::failure(None, e.to_string()),
        }

        // Listen before submitting so a fast run cannot be missed.
        let completion = inner.queue.completion_for(task_id.as_str());
        match inner.enqueue(task_id, Trigger::Manual) {
            Ok(true) => {}
            Ok(false) => {
                drop(completion);
                debug!("task already in flight, returning current state");
                tokio::time::sleep(inner.options.busy_retry).await;
                return match inner.repo.find_by_id(task_id).await {
                    Ok(Some(task)) => RunNowResult {
                        success: true,
                        task: Some(task),
                        error: None,
                        timed_out: false,
                    },
                    Ok(None) => RunNowResult::failure(None, format!("task not found: {task_id}")),
                    Err(e) => RunNowResult::failure(None, e.to_string()),
                };
            }
            Err(e) => {
                let task = inner.repo.find_by_id(task_id).await.ok().flatten();
                return RunNowResult::failure(task, e.to_string());
            }
        }

        let (success, error, timed_out) =
            match tokio::time::timeout(inner.options.run_now_timeout, completion.wait()).await {
                Ok(Ok(_)) => (true, None, false),
                Ok(Err(QueueError::Failed(message))) => (false, Some(message), false),
                Ok(Err(e)) => (false, Some(e.to_string()), false),
                Err(_) => {
                    warn!(
                        timeout_secs = inner.options.run_now_timeout.as_secs(),
                        "run-now wait timed out, run continues in background"
                    );
                    (true, None, true)
                }
            };

        let task = match self.get_next_run(task_id) {
            Some(next) => inner
                .repo
                .update(task_id, TaskUpdate::next_run(Some(next)))
                .await
                .map(Some),
            None => inner.repo.find_by_id(task_id).await,
        };
        match task {
            Ok(Some(task)) => RunNowResult {
                success,
                task: Some(task),
                error,
                timed_out,
            },
            Ok(None) => RunNowResult::failure(None, "task not found after execution"),
            Err(e) if e.is_not_found() => {
                RunNowResult::failure(None, "task not found after execution")
            }
            Err(e) => RunNowResult::failure(None, e.to_string()),
        }
    }

    /// Enable or disable a task: persist the flag, arm or disarm the timer,
    /// then persist the resulting `next_run`.
    #[instrument(skip(self, task_id), fields(task_id = %task_id))]
    pub async fn toggle_task(&self, task_id: &TaskId, is_active: bool) -> Result<Task> {
        let task = self
            .inner
            .repo
            .update(task_id, TaskUpdate::active(is_active))
            .await
            .map_err(|e| not_found_or(e, task_id))?;

        let next_run = if is_active {
            self.schedule_task(&task)
        } else {
            self.cancel_task(task_id);
            None
        };

        let task = self
            .inner
            .repo
            .update(task_id, TaskUpdate::next_run(next_run))
            .await
            .map_err(|e| not_found_or(e, task_id))?;
        info!(is_active, next_run = ?task.next_run, "task toggled");
        Ok(task)
    }

    /// Arm timers for every active task. Restarts cleanly if already
    /// running. Returns the number of tasks armed.
    ///
    /// Missed ticks from before the call are not replayed; each task gets
    /// its next future fire only.
    pub async fn start(&self) -> Result<usize> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.inner.initialized.load(Ordering::SeqCst) {
            self.stop_locked();
        }

        let tasks = self.inner.repo.find_active_tasks().await?;
        let mut armed = 0;
        for task in &tasks {
            let next_run = self.schedule_task(task);
            if next_run.is_some() {
                armed += 1;
            }
            if let Err(e) = self
                .inner
                .repo
                .update(&task.id, TaskUpdate::next_run(next_run))
                .await
            {
                warn!(task_id = %task.id, error = %e, "failed to persist next_run");
            }
        }

        self.inner.initialized.store(true, Ordering::SeqCst);
        self.ensure_janitor();
        info!(armed, active = tasks.len(), "scheduler started");
        Ok(armed)
    }

    /// Disarm every timer. Queued and running jobs are not interrupted.
    pub async fn stop(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.stop_locked();
    }

    fn stop_locked(&self) {
        let cancelled = self.inner.timers().clear();
        let was_running = self.inner.initialized.swap(false, Ordering::SeqCst);
        if was_running || cancelled > 0 {
            info!(cancelled, "scheduler stopped");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Stop, then close the queue and its housekeeping loop. The scheduler
    /// cannot be restarted afterwards.
    pub async fn shutdown(&self) {
        self.stop().await;
        if let Some(janitor) = self
            .inner
            .janitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            janitor.abort();
        }
        self.inner.queue.close();
        info!("scheduler shut down");
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.inner.queue.stats()
    }

    /// Whether the task is queued or running right now.
    pub fn is_in_flight(&self, task_id: &TaskId) -> bool {
        self.inner.in_progress.contains(task_id) || self.inner.queue.is_in_flight(task_id.as_str())
    }

    fn ensure_janitor(&self) {
        let mut janitor = self
            .inner
            .janitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if janitor.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let queue = self.inner.queue.clone();
        let every = self.inner.options.clean_interval;
        let retention = self.inner.options.retention;
        *janitor = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            // The first tick completes immediately.
            tick.tick().await;
            loop {
                tick.tick().await;
                if queue.is_closed() {
                    break;
                }
                let removed = queue.clean(retention);
                if removed > 0 {
                    debug!(removed, "queue housekeeping");
                }
            }
        }));
    }
}

impl Inner {
    fn timers(&self) -> MutexGuard<'_, TimerRegistry> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_fire(&self, expr: &CronExpression, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.options.timezone {
            ScheduleTimezone::Utc => expr.next_after(after),
            ScheduleTimezone::Local => expr.next_after_in(after, &chrono::Local),
        }
    }

    /// Submit a run unless one is already queued or executing.
    /// `Ok(false)` means it was skipped as a duplicate.
    fn enqueue(&self, task_id: &TaskId, trigger: Trigger) -> Result<bool> {
        let _gate = self.submit_gate.lock().unwrap_or_else(PoisonError::into_inner);
        if self.in_progress.contains(task_id) || self.queue.is_in_flight(task_id.as_str()) {
            debug!(%task_id, ?trigger, "run already in flight, skipping");
            return Ok(false);
        }
        let job_id = JobId(format!("{task_id}:{}", Uuid::now_v7()));
        self.queue.submit(
            job_id.clone(),
            TaskJob {
                task_id: task_id.clone(),
                trigger,
            },
        )?;
        debug!(%task_id, %job_id, ?trigger, "run queued");
        Ok(true)
    }

    /// Handle one timer fire: queue a run, then persist the next instant.
    /// Returns `false` once the timer should stop.
    async fn on_fire(
        &self,
        timer_id: TimerId,
        task_id: &TaskId,
        next_run: Option<DateTime<Utc>>,
    ) -> bool {
        match self.repo.find_by_id(task_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(%task_id, "scheduled task no longer exists, dropping its timer");
                return false;
            }
            Err(e) => {
                error!(%task_id, error = %e, "could not load task for scheduled run");
                return true;
            }
        }
        if !self.timers().is_current(timer_id, task_id) {
            debug!(%task_id, %timer_id, "timer superseded during fire");
            return false;
        }

        if let Err(e) = self.enqueue(task_id, Trigger::Schedule) {
            error!(%task_id, error = %e, "failed to queue scheduled run");
        }
        if !self.timers().is_current(timer_id, task_id) {
            return false;
        }
        if let Err(e) = self.repo.update(task_id, TaskUpdate::next_run(next_run)).await {
            warn!(%task_id, error = %e, "failed to persist next_run");
        }

        // Cancelled or re-armed while the write was in flight: persist what
        // the registry holds now so a disabled task never keeps a next_run.
        let live = {
            let timers = self.timers();
            (!timers.is_current(timer_id, task_id)).then(|| timers.next_run(task_id))
        };
        if let Some(live) = live {
            if let Err(e) = self.repo.update(task_id, TaskUpdate::next_run(live)).await {
                warn!(%task_id, error = %e, "failed to reconcile next_run");
            }
            return false;
        }
        true
    }
}

/// Timer loop for one arming of one task. Exits when superseded, when the
/// scheduler is dropped, or when the schedule has no further fires.
async fn run_timer(
    inner: Weak<Inner>,
    timer_id: TimerId,
    task_id: TaskId,
    expr: CronExpression,
    mut next: DateTime<Utc>,
) {
    loop {
        let Some(clock) = inner.upgrade().map(|inner| Arc::clone(&inner.clock)) else {
            return;
        };
        clock.sleep_until(next).await;

        let Some(scheduler) = inner.upgrade() else {
            return;
        };
        if !scheduler.timers().is_current(timer_id, &task_id) {
            return;
        }

        // A late wake-up (suspend, busy runtime) still fires once, then
        // resumes from the present rather than replaying missed ticks.
        let base = next.max(scheduler.clock.now());
        let upcoming = scheduler.next_fire(&expr, &base);
        scheduler.timers().set_next_run(timer_id, upcoming);
        debug!(%task_id, %timer_id, fired = %next, next_run = ?upcoming, "timer fired");

        let keep = scheduler.on_fire(timer_id, &task_id, upcoming).await;
        match upcoming {
            Some(at) if keep => next = at,
            _ => {
                let mut timers = scheduler.timers();
                if timers.is_current(timer_id, &task_id) {
                    timers.retire(timer_id);
                }
                return;
            }
        }
    }
}

fn not_found_or(e: tasker_core::TaskerError, task_id: &TaskId) -> SchedulerError {
    if e.is_not_found() {
        SchedulerError::TaskNotFound {
            id: task_id.0.clone(),
        }
    } else {
        SchedulerError::Repository(e)
    }
}
