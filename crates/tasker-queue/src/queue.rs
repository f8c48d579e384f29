use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::completion::{Completion, Listeners};
use crate::error::{QueueError, Result};
use crate::job::{JobId, JobPayload, JobProcessor, JobState, QueueJob, QueueStats};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Maximum number of jobs in `Active` at once. Clamped to at least 1.
    pub concurrency: usize,
    /// Fallback wake-up for the dispatcher. Submissions and completions wake
    /// it directly.
    pub poll_interval: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

struct JobEntry<P, O> {
    payload: P,
    state: watch::Sender<JobState<O>>,
    submitted_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    finished: Option<Instant>,
}

impl<P: Clone, O: Clone> JobEntry<P, O> {
    fn snapshot(&self, id: &JobId) -> QueueJob<P, O> {
        QueueJob {
            id: id.clone(),
            payload: self.payload.clone(),
            state: self.state.borrow().clone(),
            submitted_at: self.submitted_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

struct QueueState<P, O> {
    jobs: HashMap<JobId, JobEntry<P, O>>,
    /// Ids in `Waiting`, oldest first.
    waiting: VecDeque<JobId>,
    active: usize,
    closed: bool,
}

struct Shared<P, O: Clone> {
    name: String,
    options: QueueOptions,
    state: Mutex<QueueState<P, O>>,
    processor: OnceLock<Arc<dyn JobProcessor<P, O>>>,
    listeners: Arc<Listeners<O>>,
    wake: Notify,
    cancel: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

/// In-memory job queue with bounded concurrency and a single processor.
///
/// Cloning yields another handle to the same queue.
pub struct ExecutionQueue<P, O: Clone> {
    shared: Arc<Shared<P, O>>,
}

impl<P, O: Clone> Clone for ExecutionQueue<P, O> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P, O> ExecutionQueue<P, O>
where
    P: JobPayload,
    O: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, options: QueueOptions) -> Self {
        let options = QueueOptions {
            concurrency: options.concurrency.max(1),
            ..options
        };
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                options,
                state: Mutex::new(QueueState {
                    jobs: HashMap::new(),
                    waiting: VecDeque::new(),
                    active: 0,
                    closed: false,
                }),
                processor: OnceLock::new(),
                listeners: Arc::new(Listeners::new()),
                wake: Notify::new(),
                cancel: CancellationToken::new(),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Install the processor and start dispatching. Must be called from
    /// within a Tokio runtime.
    pub fn set_processor<T>(&self, processor: T) -> Result<()>
    where
        T: JobProcessor<P, O>,
    {
        if self.shared.lock().closed {
            return Err(QueueError::Closed);
        }
        self.shared
            .processor
            .set(Arc::new(processor))
            .map_err(|_| QueueError::ProcessorAlreadySet)?;

        let handle = tokio::spawn(dispatch_loop(Arc::clone(&self.shared)));
        *self
            .shared
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!(queue = %self.shared.name, concurrency = self.shared.options.concurrency, "queue processor installed");
        Ok(())
    }

    /// Register a job in `Waiting` and wake the dispatcher. Never blocks on
    /// execution.
    pub fn submit(&self, id: impl Into<JobId>, payload: P) -> Result<QueueJob<P, O>> {
        let id = id.into();
        let snapshot = {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            if state.jobs.contains_key(&id) {
                return Err(QueueError::DuplicateJob { id: id.0 });
            }
            let (tx, _) = watch::channel(JobState::Waiting);
            let entry = JobEntry {
                payload,
                state: tx,
                submitted_at: Utc::now(),
                started_at: None,
                finished_at: None,
                finished: None,
            };
            let snapshot = entry.snapshot(&id);
            state.waiting.push_back(id.clone());
            state.jobs.insert(id.clone(), entry);
            snapshot
        };
        debug!(queue = %self.shared.name, job_id = %id, "job submitted");
        self.shared.wake.notify_one();
        Ok(snapshot)
    }

    /// Wait until the job completes (`Ok`) or fails (`Err(Failed)`).
    pub async fn await_completion(&self, id: &JobId) -> Result<O> {
        let mut rx = {
            let state = self.shared.lock();
            let entry = state
                .jobs
                .get(id)
                .ok_or_else(|| QueueError::UnknownJob { id: id.0.clone() })?;
            entry.state.subscribe()
        };

        loop {
            if let Some(outcome) = settled(&rx.borrow_and_update()) {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return settled(&rx.borrow()).unwrap_or(Err(QueueError::Closed));
            }
        }
    }

    /// Listener for the next job carrying `key` to finish, whichever job id
    /// it has. Register before submitting to avoid missing a fast job.
    pub fn completion_for(&self, key: &str) -> Completion<O> {
        self.shared.listeners.register(key)
    }

    /// Whether a job with this completion key is waiting or active.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.shared.lock().jobs.values().any(|entry| {
            entry.payload.completion_key() == Some(key) && entry.state.borrow().is_pending()
        })
    }

    pub fn jobs_for_key(&self, key: &str) -> Vec<QueueJob<P, O>> {
        let state = self.shared.lock();
        let mut jobs: Vec<_> = state
            .jobs
            .iter()
            .filter(|(_, entry)| entry.payload.completion_key() == Some(key))
            .map(|(id, entry)| entry.snapshot(id))
            .collect();
        jobs.sort_by_key(|job| job.submitted_at);
        jobs
    }

    pub fn job(&self, id: &JobId) -> Option<QueueJob<P, O>> {
        self.shared.lock().jobs.get(id).map(|entry| entry.snapshot(id))
    }

    pub fn jobs(&self) -> Vec<QueueJob<P, O>> {
        let state = self.shared.lock();
        let mut jobs: Vec<_> = state
            .jobs
            .iter()
            .map(|(id, entry)| entry.snapshot(id))
            .collect();
        jobs.sort_by_key(|job| job.submitted_at);
        jobs
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.shared.lock();
        let mut stats = QueueStats::default();
        for entry in state.jobs.values() {
            match &*entry.state.borrow() {
                JobState::Waiting => stats.waiting += 1,
                JobState::Active => stats.active += 1,
                JobState::Completed(_) => stats.completed += 1,
                JobState::Failed(_) => stats.failed += 1,
            }
        }
        stats
    }

    /// Remove completed and failed jobs that finished at least `max_age` ago.
    pub fn clean(&self, max_age: Duration) -> usize {
        let mut state = self.shared.lock();
        let before = state.jobs.len();
        state.jobs.retain(|_, entry| {
            entry
                .finished
                .map_or(true, |finished| finished.elapsed() < max_age)
        });
        let removed = before - state.jobs.len();
        if removed > 0 {
            debug!(queue = %self.shared.name, removed, "finished jobs cleaned");
        }
        removed
    }

    /// Stop dispatching and drop every job and listener. Pending waiters
    /// observe [`QueueError::Closed`]. Runs already in progress finish in the
    /// background but their results are discarded.
    pub fn close(&self) {
        {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.jobs.clear();
            state.waiting.clear();
        }
        self.shared.cancel.cancel();
        self.shared.listeners.clear();
        if let Some(handle) = self
            .shared
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        info!(queue = %self.shared.name, "queue closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

impl<P, O: Clone> Shared<P, O> {
    fn lock(&self) -> MutexGuard<'_, QueueState<P, O>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn settled<O: Clone>(state: &JobState<O>) -> Option<Result<O>> {
    match state {
        JobState::Completed(output) => Some(Ok(output.clone())),
        JobState::Failed(message) => Some(Err(QueueError::Failed(message.clone()))),
        JobState::Waiting | JobState::Active => None,
    }
}

async fn dispatch_loop<P, O>(shared: Arc<Shared<P, O>>)
where
    P: JobPayload,
    O: Clone + Send + Sync + 'static,
{
    let mut tick = tokio::time::interval(shared.options.poll_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = shared.wake.notified() => {}
            _ = tick.tick() => {}
        }
        admit(&shared);
    }
    debug!(queue = %shared.name, "dispatcher stopped");
}

/// Move waiting jobs to `Active` up to the concurrency limit and spawn them.
fn admit<P, O>(shared: &Arc<Shared<P, O>>)
where
    P: JobPayload,
    O: Clone + Send + Sync + 'static,
{
    let Some(processor) = shared.processor.get().cloned() else {
        return;
    };

    let admitted: Vec<(JobId, P)> = {
        let mut state = shared.lock();
        let mut admitted = Vec::new();
        while !state.closed && state.active < shared.options.concurrency {
            let Some(id) = state.waiting.pop_front() else {
                break;
            };
            let Some(entry) = state.jobs.get_mut(&id) else {
                continue;
            };
            if !matches!(*entry.state.borrow(), JobState::Waiting) {
                continue;
            }
            entry.started_at = Some(Utc::now());
            entry.state.send_replace(JobState::Active);
            let payload = entry.payload.clone();
            state.active += 1;
            admitted.push((id, payload));
        }
        admitted
    };

    for (id, payload) in admitted {
        debug!(queue = %shared.name, job_id = %id, "job started");
        tokio::spawn(run_job(Arc::clone(shared), Arc::clone(&processor), id, payload));
    }
}

async fn run_job<P, O>(
    shared: Arc<Shared<P, O>>,
    processor: Arc<dyn JobProcessor<P, O>>,
    id: JobId,
    payload: P,
) where
    P: JobPayload,
    O: Clone + Send + Sync + 'static,
{
    let key = payload.completion_key().map(str::to_string);

    // Run in its own task so a panicking processor still settles the job.
    let job_id = id.clone();
    let outcome = match tokio::spawn(async move { processor.process(&job_id, payload).await }).await
    {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(failure)) => Err(failure.0),
        Err(join) if join.is_panic() => Err("processor panicked".to_string()),
        Err(join) => Err(join.to_string()),
    };

    let result = {
        let mut state = shared.lock();
        state.active = state.active.saturating_sub(1);
        match state.jobs.get_mut(&id) {
            Some(entry) => {
                entry.finished_at = Some(Utc::now());
                entry.finished = Some(Instant::now());
                let final_state = match &outcome {
                    Ok(output) => JobState::Completed(output.clone()),
                    Err(message) => JobState::Failed(message.clone()),
                };
                entry.state.send_replace(final_state);
                Some(outcome.map_err(QueueError::Failed))
            }
            // Closed (or cleaned) while running.
            None => None,
        }
    };

    match &result {
        Some(Ok(_)) => debug!(queue = %shared.name, job_id = %id, "job completed"),
        Some(Err(e)) => warn!(queue = %shared.name, job_id = %id, error = %e, "job failed"),
        None => debug!(queue = %shared.name, job_id = %id, "job finished after removal"),
    }

    if let (Some(key), Some(result)) = (key, result) {
        shared.listeners.resolve(&key, &result);
    }
    shared.wake.notify_one();
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::job::{JobFailure, JobStatus};

    #[derive(Debug, Clone)]
    struct Work {
        key: String,
        delay_ms: u64,
        fail: bool,
    }

    impl Work {
        fn ok(key: &str) -> Self {
            Self {
                key: key.to_string(),
                delay_ms: 0,
                fail: false,
            }
        }
    }

    impl JobPayload for Work {
        fn completion_key(&self) -> Option<&str> {
            Some(&self.key)
        }
    }

    #[derive(Default)]
    struct Recorder {
        current: AtomicUsize,
        peak: AtomicUsize,
        runs: AtomicUsize,
    }

    struct Echo(Arc<Recorder>);

    #[async_trait]
    impl JobProcessor<Work, String> for Echo {
        async fn process(&self, job_id: &JobId, work: Work) -> std::result::Result<String, JobFailure> {
            let now = self.0.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.0.peak.fetch_max(now, Ordering::SeqCst);
            self.0.runs.fetch_add(1, Ordering::SeqCst);
            if work.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(work.delay_ms)).await;
            }
            self.0.current.fetch_sub(1, Ordering::SeqCst);
            if work.fail {
                return Err(JobFailure::from("boom"));
            }
            Ok(format!("{}:{}", work.key, job_id))
        }
    }

    struct Panics;

    #[async_trait]
    impl JobProcessor<Work, String> for Panics {
        async fn process(&self, _: &JobId, _: Work) -> std::result::Result<String, JobFailure> {
            panic!("processor blew up");
        }
    }

    fn queue() -> (ExecutionQueue<Work, String>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let q = ExecutionQueue::new("test", QueueOptions::default());
        q.set_processor(Echo(Arc::clone(&recorder))).unwrap();
        (q, recorder)
    }

    #[tokio::test]
    async fn completes_and_reports_output() {
        let (q, _) = queue();
        q.submit("j1", Work::ok("a")).unwrap();
        assert_eq!(q.await_completion(&"j1".into()).await, Ok("a:j1".to_string()));
        assert_eq!(q.job(&"j1".into()).unwrap().state.status(), JobStatus::Completed);
        assert_eq!(q.stats().completed, 1);
    }

    #[tokio::test]
    async fn failure_is_captured() {
        let (q, _) = queue();
        let work = Work {
            fail: true,
            ..Work::ok("a")
        };
        q.submit("j1", work).unwrap();
        assert_eq!(
            q.await_completion(&"j1".into()).await,
            Err(QueueError::Failed("boom".to_string()))
        );
        assert_eq!(q.stats().failed, 1);
    }

    #[tokio::test]
    async fn panic_marks_job_failed() {
        let q = ExecutionQueue::new("panics", QueueOptions::default());
        q.set_processor(Panics).unwrap();
        q.submit("j1", Work::ok("a")).unwrap();
        assert!(matches!(
            q.await_completion(&"j1".into()).await,
            Err(QueueError::Failed(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_ids_and_second_processor_rejected() {
        let (q, recorder) = queue();
        q.submit("j1", Work::ok("a")).unwrap();
        assert_eq!(
            q.submit("j1", Work::ok("a")).unwrap_err(),
            QueueError::DuplicateJob { id: "j1".into() }
        );
        assert_eq!(
            q.set_processor(Echo(recorder)).unwrap_err(),
            QueueError::ProcessorAlreadySet
        );
    }

    #[tokio::test]
    async fn concurrency_one_never_overlaps() {
        let (q, recorder) = queue();
        for i in 0..5 {
            let work = Work {
                delay_ms: 10,
                ..Work::ok("a")
            };
            q.submit(format!("j{i}"), work).unwrap();
        }
        for i in 0..5 {
            q.await_completion(&format!("j{i}").into()).await.unwrap();
        }
        assert_eq!(recorder.peak.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.runs.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn jobs_wait_until_processor_installed() {
        let q: ExecutionQueue<Work, String> = ExecutionQueue::new("late", QueueOptions::default());
        q.submit("j1", Work::ok("a")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(q.stats().waiting, 1);
        assert!(q.is_in_flight("a"));

        let recorder = Arc::new(Recorder::default());
        q.set_processor(Echo(recorder)).unwrap();
        q.await_completion(&"j1".into()).await.unwrap();
        assert!(!q.is_in_flight("a"));
    }

    #[tokio::test]
    async fn keyed_completion_follows_any_job_id() {
        let (q, _) = queue();
        let done = q.completion_for("task-9");
        q.submit("whatever-id", Work::ok("task-9")).unwrap();
        assert_eq!(done.wait().await, Ok("task-9:whatever-id".to_string()));
        assert_eq!(q.shared.listeners.len(), 0);
    }

    #[tokio::test]
    async fn timed_out_listener_is_released() {
        let q: ExecutionQueue<Work, String> = ExecutionQueue::new("idle", QueueOptions::default());
        let done = q.completion_for("never");
        let res = tokio::time::timeout(Duration::from_millis(10), done.wait()).await;
        assert!(res.is_err());
        assert_eq!(q.shared.listeners.len(), 0);
    }

    #[tokio::test]
    async fn clean_removes_only_finished_jobs() {
        let q: ExecutionQueue<Work, String> = ExecutionQueue::new("clean", QueueOptions::default());
        q.submit("done", Work::ok("b")).unwrap();
        let recorder = Arc::new(Recorder::default());
        q.set_processor(Echo(recorder)).unwrap();
        q.await_completion(&"done".into()).await.unwrap();
        let slow = Work {
            delay_ms: 200,
            ..Work::ok("c")
        };
        q.submit("slow", slow).unwrap();

        assert_eq!(q.clean(Duration::from_secs(3600)), 0);
        assert_eq!(q.clean(Duration::ZERO), 1);
        assert!(q.job(&"done".into()).is_none());
        assert!(q.job(&"slow".into()).is_some());
    }

    #[tokio::test]
    async fn close_wakes_waiters() {
        let q: ExecutionQueue<Work, String> = ExecutionQueue::new("closing", QueueOptions::default());
        q.submit("j1", Work::ok("a")).unwrap();
        let keyed = q.completion_for("a");
        let waiter = {
            let q = q.clone();
            tokio::spawn(async move { q.await_completion(&"j1".into()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.close();

        assert_eq!(waiter.await.unwrap(), Err(QueueError::Closed));
        assert_eq!(keyed.wait().await, Err(QueueError::Closed));
        assert_eq!(q.submit("j2", Work::ok("a")).unwrap_err(), QueueError::Closed);
        assert!(q.jobs().is_empty());
    }
}
