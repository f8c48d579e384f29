use std::process::{Output, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tasker_core::config::{ExecutorConfig, DEFAULT_MAX_OUTPUT_CHARS};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::clip::clip_middle;
use crate::error::{ExecError, Result};

/// How long to wait for pipes to drain after killing a timed-out child.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// What a finished command left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output, ANSI escapes stripped and clipped.
    pub stdout: String,
    /// Captured standard error, ANSI escapes stripped and clipped.
    pub stderr: String,
    /// Killed for exceeding the runner's timeout.
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs command strings through a shell (`<shell> -c <command>`).
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    timeout: Option<Duration>,
    max_output_chars: usize,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            timeout: None,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.shell.clone())
            .with_timeout(config.timeout_secs.map(Duration::from_secs))
            .with_max_output_chars(config.max_output_chars)
    }

    /// Kill the command after `timeout`. `None` lets it run indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_chars(mut self, max: usize) -> Self {
        self.max_output_chars = max;
        self
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Run `command` to completion (or until the timeout) and capture its
    /// output. A non-zero exit is reported in the output, not as an error.
    ///
    /// # Errors
    ///
    /// - `Spawn` if the shell cannot be started.
    /// - `Io` if waiting on the child fails.
    pub async fn run(&self, command: &str) -> Result<CommandOutput> {
        debug!(shell = %self.shell, %command, "running command");

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so a timeout kill reaches the shell's children.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(ExecError::Spawn)?;
        let pid = child.id();

        // `wait_with_output` consumes the child; drive it on its own task so
        // the deadline can race it.
        let (tx, mut rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = tx.send(child.wait_with_output().await);
        });

        let Some(limit) = self.timeout else {
            return self.finish(rx.await, false);
        };

        match tokio::time::timeout(limit, &mut rx).await {
            Ok(received) => self.finish(received, false),
            Err(_elapsed) => {
                warn!(%command, timeout_ms = limit.as_millis() as u64, "command timed out, killing");
                kill_tree(pid);
                match tokio::time::timeout(KILL_GRACE, rx).await {
                    Ok(received) => self.finish(received, true),
                    Err(_) => Ok(CommandOutput {
                        exit_code: None,
                        stdout: String::new(),
                        stderr: String::new(),
                        timed_out: true,
                    }),
                }
            }
        }
    }

    fn finish(
        &self,
        received: std::result::Result<std::io::Result<Output>, oneshot::error::RecvError>,
        timed_out: bool,
    ) -> Result<CommandOutput> {
        let output = received.map_err(|e| ExecError::Collector(e.to_string()))??;
        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: clip_middle(&strip_text(&output.stdout), self.max_output_chars),
            stderr: clip_middle(&strip_text(&output.stderr), self.max_output_chars),
            timed_out,
        })
    }
}

/// Strip ANSI escape codes and convert bytes to a UTF-8 string.
fn strip_text(raw: &[u8]) -> String {
    let clean = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&clean).into_owned()
}

#[cfg(unix)]
fn kill_tree(pid: Option<u32>) {
    if let Some(pid) = pid {
        // SAFETY: `pid` is our direct child and leads its own process group,
        // so the negated id addresses exactly that group.
        unsafe {
            libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_tree(pid: Option<u32>) {
    if let Some(pid) = pid {
        let _ = std::process::Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .output();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let out = ShellRunner::default().run("echo hello").await.unwrap();
        assert!(out.success());
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.stderr.is_empty());
    }

    #[tokio::test]
    async fn non_zero_exit_is_not_an_error() {
        let out = ShellRunner::default()
            .run("echo oops >&2; exit 3")
            .await
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn ansi_escapes_are_stripped() {
        let out = ShellRunner::default()
            .run(r"printf '\033[31mred\033[0m'")
            .await
            .unwrap();
        assert_eq!(out.stdout, "red");
    }

    #[tokio::test]
    async fn output_is_clipped() {
        let out = ShellRunner::default()
            .with_max_output_chars(10)
            .run("printf 'aaaaaaaaaaXXXXXXXXXXbbbbbbbbbb'")
            .await
            .unwrap();
        assert!(out.stdout.starts_with("aaaaa"));
        assert!(out.stdout.ends_with("bbbbb"));
        assert!(out.stdout.contains("[20 chars omitted]"));
    }

    #[tokio::test]
    async fn timeout_kills_the_command() {
        let started = std::time::Instant::now();
        let out = ShellRunner::default()
            .with_timeout(Some(Duration::from_millis(200)))
            .run("sleep 5; echo late")
            .await
            .unwrap();
        assert!(out.timed_out);
        assert!(!out.success());
        assert!(!out.stdout.contains("late"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn missing_shell_fails_to_spawn() {
        let err = ShellRunner::new("/nonexistent/shell")
            .run("true")
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn(_)));
    }
}
