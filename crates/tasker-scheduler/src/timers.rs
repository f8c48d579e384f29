//! Bookkeeping for armed timers: one binding per timer id, one timer id per
//! task.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tasker_core::TaskId;
use tokio::task::JoinHandle;

/// Identity of one arming of a task's timer. Every (re)schedule mints a new
/// one, so a fire from a superseded arming can recognise itself as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

struct TimerBinding {
    task_id: TaskId,
    next_run: Option<DateTime<Utc>>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub(crate) struct TimerRegistry {
    by_id: HashMap<TimerId, TimerBinding>,
    by_task: HashMap<TaskId, TimerId>,
}

impl TimerRegistry {
    /// Record a freshly armed timer. Any previous timer for the task must
    /// already have been removed.
    pub(crate) fn insert(
        &mut self,
        timer_id: TimerId,
        task_id: TaskId,
        next_run: DateTime<Utc>,
        handle: JoinHandle<()>,
    ) {
        if let Some(stale) = self.by_task.insert(task_id.clone(), timer_id) {
            if let Some(binding) = self.by_id.remove(&stale) {
                binding.handle.abort();
            }
        }
        self.by_id.insert(
            timer_id,
            TimerBinding {
                task_id,
                next_run: Some(next_run),
                handle,
            },
        );
    }

    /// Abort and forget the task's timer. Returns the removed timer id.
    pub(crate) fn remove_task(&mut self, task_id: &TaskId) -> Option<TimerId> {
        let timer_id = self.by_task.remove(task_id)?;
        if let Some(binding) = self.by_id.remove(&timer_id) {
            binding.handle.abort();
        }
        Some(timer_id)
    }

    /// Forget a timer whose loop is ending on its own. The handle is not
    /// aborted since the caller is that timer.
    pub(crate) fn retire(&mut self, timer_id: TimerId) {
        if let Some(binding) = self.by_id.remove(&timer_id) {
            if self.by_task.get(&binding.task_id) == Some(&timer_id) {
                self.by_task.remove(&binding.task_id);
            }
        }
    }

    /// Whether `timer_id` is still the task's live timer.
    pub(crate) fn is_current(&self, timer_id: TimerId, task_id: &TaskId) -> bool {
        self.by_task.get(task_id) == Some(&timer_id)
    }

    pub(crate) fn set_next_run(&mut self, timer_id: TimerId, next_run: Option<DateTime<Utc>>) {
        if let Some(binding) = self.by_id.get_mut(&timer_id) {
            binding.next_run = next_run;
        }
    }

    pub(crate) fn next_run(&self, task_id: &TaskId) -> Option<DateTime<Utc>> {
        let timer_id = self.by_task.get(task_id)?;
        self.by_id.get(timer_id)?.next_run
    }

    /// Abort every timer. Returns how many were armed.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.by_id.len();
        for (_, binding) in self.by_id.drain() {
            binding.handle.abort();
        }
        self.by_task.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.by_task.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle() -> JoinHandle<()> {
        tokio::spawn(std::future::pending())
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn replacing_a_timer_supersedes_the_old_epoch() {
        let mut timers = TimerRegistry::default();
        let task = TaskId::from("t1");
        timers.insert(TimerId(1), task.clone(), at("2026-01-01T00:01:00Z"), idle());
        timers.insert(TimerId(2), task.clone(), at("2026-01-01T00:02:00Z"), idle());

        assert!(!timers.is_current(TimerId(1), &task));
        assert!(timers.is_current(TimerId(2), &task));
        assert_eq!(timers.next_run(&task), Some(at("2026-01-01T00:02:00Z")));
        assert_eq!(timers.len(), 1);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let mut timers = TimerRegistry::default();
        let task = TaskId::from("t1");
        timers.insert(TimerId(7), task.clone(), at("2026-01-01T00:01:00Z"), idle());

        assert_eq!(timers.remove_task(&task), Some(TimerId(7)));
        assert_eq!(timers.remove_task(&task), None);
        assert_eq!(timers.next_run(&task), None);
    }

    #[tokio::test]
    async fn retiring_a_stale_timer_keeps_the_live_one() {
        let mut timers = TimerRegistry::default();
        let task = TaskId::from("t1");
        timers.insert(TimerId(1), task.clone(), at("2026-01-01T00:01:00Z"), idle());
        timers.remove_task(&task);
        timers.insert(TimerId(2), task.clone(), at("2026-01-01T00:02:00Z"), idle());

        timers.retire(TimerId(1));
        assert!(timers.is_current(TimerId(2), &task));
        assert_eq!(timers.clear(), 1);
        assert_eq!(timers.len(), 0);
    }
}
