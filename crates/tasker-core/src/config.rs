use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 18790;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Execution queue concurrency. Shell runs never overlap process-wide.
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
/// How long `execute_task_now` waits for the run before returning anyway.
pub const DEFAULT_RUN_NOW_TIMEOUT_SECS: u64 = 30;
/// Pause before re-reading a task whose run was already in flight.
pub const DEFAULT_BUSY_RETRY_MS: u64 = 1_000;
pub const DEFAULT_CLEAN_INTERVAL_SECS: u64 = 60 * 60;
pub const DEFAULT_RETENTION_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 30_000;

/// Top-level config (tasker.toml + TASKER_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskerConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Wall clock that cron fields are evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleTimezone {
    #[default]
    Utc,
    /// The host's local timezone.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Arm timers for all active tasks when the gateway boots.
    #[serde(default = "bool_true")]
    pub autostart: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Fallback wake-up for the queue dispatcher.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_run_now_timeout_secs")]
    pub run_now_timeout_secs: u64,
    #[serde(default = "default_busy_retry_ms")]
    pub busy_retry_ms: u64,
    /// Cadence of finished-job cleanup in the execution queue.
    #[serde(default = "default_clean_interval_secs")]
    pub clean_interval_secs: u64,
    /// Finished queue jobs older than this are purged.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default)]
    pub timezone: ScheduleTimezone,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            autostart: true,
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            run_now_timeout_secs: DEFAULT_RUN_NOW_TIMEOUT_SECS,
            busy_retry_ms: DEFAULT_BUSY_RETRY_MS,
            clean_interval_secs: DEFAULT_CLEAN_INTERVAL_SECS,
            retention_secs: DEFAULT_RETENTION_SECS,
            timezone: ScheduleTimezone::Utc,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Shell binary; commands run as `<shell> -c <command>`.
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Hard kill deadline for a single run. Unset means no limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            timeout_secs: None,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_run_now_timeout_secs() -> u64 {
    DEFAULT_RUN_NOW_TIMEOUT_SECS
}
fn default_busy_retry_ms() -> u64 {
    DEFAULT_BUSY_RETRY_MS
}
fn default_clean_interval_secs() -> u64 {
    DEFAULT_CLEAN_INTERVAL_SECS
}
fn default_retention_secs() -> u64 {
    DEFAULT_RETENTION_SECS
}
fn default_shell() -> String {
    "sh".to_string()
}
fn default_max_output_chars() -> usize {
    DEFAULT_MAX_OUTPUT_CHARS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tasker/tasker.db", home)
}

impl TaskerConfig {
    /// Load config from a TOML file with TASKER_* env var overrides.
    ///
    /// The file is the explicit path if given, else `~/.tasker/tasker.toml`.
    /// A missing file is not an error; every field has a default. Nested keys
    /// are separated by a double underscore in env vars, e.g.
    /// `TASKER_SCHEDULER__RUN_NOW_TIMEOUT_SECS=10`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::TaskerError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("TASKER_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tasker/tasker.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pin_single_concurrency() {
        let config = TaskerConfig::default();
        assert_eq!(config.scheduler.concurrency, 1);
        assert_eq!(config.scheduler.run_now_timeout_secs, 30);
        assert_eq!(config.scheduler.timezone, ScheduleTimezone::Utc);
        assert_eq!(config.executor.shell, "sh");
        assert!(config.executor.timeout_secs.is_none());
    }

    #[test]
    fn file_and_env_are_merged() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "tasker.toml",
                r#"
                [gateway]
                port = 9000

                [scheduler]
                timezone = "local"
                retention_secs = 60
                "#,
            )?;
            jail.set_env("TASKER_SCHEDULER__RUN_NOW_TIMEOUT_SECS", "5");
            jail.set_env("TASKER_EXECUTOR__TIMEOUT_SECS", "120");

            let config = TaskerConfig::load(Some("tasker.toml"))
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.gateway.port, 9000);
            assert_eq!(config.gateway.bind, DEFAULT_BIND);
            assert_eq!(config.scheduler.timezone, ScheduleTimezone::Local);
            assert_eq!(config.scheduler.retention_secs, 60);
            assert_eq!(config.scheduler.run_now_timeout_secs, 5);
            assert_eq!(config.executor.timeout_secs, Some(120));
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = TaskerConfig::load(Some("does-not-exist.toml"))
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.gateway.port, DEFAULT_PORT);
            Ok(())
        });
    }
}
