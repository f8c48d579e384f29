//! `tasker-scheduler`: arms one cron timer per active task and runs fires
//! through a bounded execution queue.
//!
//! The [`Scheduler`] is the only component that mutates scheduling state:
//! timers, in-flight tracking, and each task's persisted `next_run`.

pub mod clock;
pub mod error;
pub mod options;
pub mod runner;
pub mod scheduler;
pub mod timers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, SchedulerError};
pub use options::SchedulerOptions;
pub use runner::{ExecutionReport, TaskJob, Trigger};
pub use scheduler::{RunNowResult, Scheduler};
pub use timers::TimerId;
