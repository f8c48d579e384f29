use std::time::Duration;

use tasker_core::config::{
    ScheduleTimezone, SchedulerConfig, DEFAULT_BUSY_RETRY_MS, DEFAULT_CLEAN_INTERVAL_SECS,
    DEFAULT_CONCURRENCY, DEFAULT_POLL_INTERVAL_MS, DEFAULT_RETENTION_SECS,
    DEFAULT_RUN_NOW_TIMEOUT_SECS,
};

/// Runtime knobs for [`crate::Scheduler`], usually built from `[scheduler]`
/// in the config file.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub run_now_timeout: Duration,
    pub busy_retry: Duration,
    pub clean_interval: Duration,
    pub retention: Duration,
    pub timezone: ScheduleTimezone,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            run_now_timeout: Duration::from_secs(DEFAULT_RUN_NOW_TIMEOUT_SECS),
            busy_retry: Duration::from_millis(DEFAULT_BUSY_RETRY_MS),
            clean_interval: Duration::from_secs(DEFAULT_CLEAN_INTERVAL_SECS),
            retention: Duration::from_secs(DEFAULT_RETENTION_SECS),
            timezone: ScheduleTimezone::Utc,
        }
    }
}

impl From<&SchedulerConfig> for SchedulerOptions {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            run_now_timeout: Duration::from_secs(config.run_now_timeout_secs),
            busy_retry: Duration::from_millis(config.busy_retry_ms),
            clean_interval: Duration::from_secs(config.clean_interval_secs.max(1)),
            retention: Duration::from_secs(config.retention_secs),
            timezone: config.timezone,
        }
    }
}
