//! Subprocess executor that runs tasks through the `claude` CLI.

use crate::task::{
    domain::{Execution, Task},
    ports::{ExecuteOptions, ExecutorError, ExecutorResult, TaskExecutor},
};
use async_trait::async_trait;
use mockable::Clock;
use serde_json::Value;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default binary name, resolved through `PATH`.
pub const DEFAULT_BINARY: &str = "claude";

/// How long to wait for pipe readers once the process is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

const READ_CHUNK: usize = 8192;

/// Executor spawning one `claude --print` process per task.
#[derive(Debug, Clone)]
pub struct ClaudeExecutor<C>
where
    C: Clock + Send + Sync,
{
    binary: String,
    extra_args: Vec<String>,
    clock: Arc<C>,
}

impl<C> ClaudeExecutor<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an executor for the given binary path.
    #[must_use]
    pub fn new(binary: impl Into<String>, clock: Arc<C>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
            clock,
        }
    }

    /// Adds arguments passed after `--print` on every run.
    #[must_use]
    pub fn with_extra_args(mut self, extra_args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args = extra_args.into_iter().collect();
        self
    }

    /// Returns the binary path.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Builds the argument list for `task`.
    ///
    /// The session override in `options` wins over the token stored on the
    /// task. The prompt is always the last argument.
    #[must_use]
    pub fn build_args(&self, task: &Task, options: &ExecuteOptions) -> Vec<String> {
        let mut args = vec!["--print".to_owned()];
        args.extend(self.extra_args.iter().cloned());
        if let Some(token) = options.resume_token(task) {
            args.push("--resume".to_owned());
            args.push(token.to_owned());
        }
        args.push(task.prompt().to_owned());
        args
    }

    /// Describes the command a real run would start.
    #[must_use]
    pub fn dry_run_output(&self, task: &Task, options: &ExecuteOptions) -> String {
        let command_line = std::iter::once(shell_escape(&self.binary))
            .chain(
                self.build_args(task, options)
                    .iter()
                    .map(|arg| shell_escape(arg)),
            )
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "[DRY RUN] Would execute:\n  Command: {command_line}\n  WorkDir: {}\n  Prompt:  {:?}",
            task.work_dir().display(),
            task.prompt(),
        )
    }

    async fn run(&self, task: &Task, options: &ExecuteOptions) -> Execution {
        let started_at = self.clock.utc();
        let args = self.build_args(task, options);
        debug!(
            task_id = %task.id(),
            binary = %self.binary,
            work_dir = %task.work_dir().display(),
            resume = options.resume_token(task).is_some(),
            "spawning external tool"
        );

        let mut command = Command::new(&self.binary);
        command
            .args(&args)
            .current_dir(task.work_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so a timeout reaches every descendant.
        #[cfg(unix)]
        command.process_group(0);

        let output = match command.spawn() {
            Ok(child) => wait_with_deadline(child, options.timeout).await,
            Err(err) => ProcessOutput {
                exit: Err(format!("failed to start {}: {err}", self.binary)),
                stdout: String::new(),
                stderr: String::new(),
            },
        };
        let ended_at = self.clock.utc();

        match output.exit {
            Ok(()) => Execution {
                task_id: task.id().clone(),
                success: true,
                session_id: extract_session_id(&output.stdout),
                output: output.stdout,
                error: String::new(),
                started_at,
                ended_at,
            },
            Err(exit_error) => Execution {
                task_id: task.id().clone(),
                success: false,
                output: output.stdout,
                error: format_error(&exit_error, &output.stderr),
                session_id: String::new(),
                started_at,
                ended_at,
            },
        }
    }
}

#[async_trait]
impl<C> TaskExecutor for ClaudeExecutor<C>
where
    C: Clock + Send + Sync,
{
    async fn execute(&self, task: &Task, options: &ExecuteOptions) -> ExecutorResult<Execution> {
        if task.work_dir().as_os_str().is_empty() {
            return Err(ExecutorError::EmptyWorkDir(task.id().clone()));
        }
        if task.prompt().trim().is_empty() {
            return Err(ExecutorError::EmptyPrompt(task.id().clone()));
        }
        if options.timeout.is_zero() {
            return Err(ExecutorError::ZeroTimeout);
        }

        if options.dry_run {
            let started_at = self.clock.utc();
            let output = self.dry_run_output(task, options);
            return Ok(Execution {
                task_id: task.id().clone(),
                success: true,
                output,
                error: String::new(),
                session_id: String::new(),
                started_at,
                ended_at: self.clock.utc(),
            });
        }

        let execution = self.run(task, options).await;
        info!(
            task_id = %task.id(),
            success = execution.success,
            duration_secs = execution.duration().as_secs_f64(),
            "external tool finished"
        );
        Ok(execution)
    }

    async fn check_installed(&self) -> ExecutorResult<()> {
        let not_installed = |reason: String| ExecutorError::NotInstalled {
            binary: self.binary.clone(),
            reason,
        };
        let status = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|err| not_installed(err.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(not_installed(status.to_string()))
        }
    }
}

struct ProcessOutput {
    exit: Result<(), String>,
    stdout: String,
    stderr: String,
}

/// Waits for `child` until `timeout`, killing its process group on expiry.
async fn wait_with_deadline(mut child: Child, timeout: Duration) -> ProcessOutput {
    let stdout = PipeBuffer::default();
    let stderr = PipeBuffer::default();
    let stdout_reader = tokio::spawn(drain(child.stdout.take(), stdout.clone()));
    let stderr_reader = tokio::spawn(drain(child.stderr.take(), stderr.clone()));

    let exit = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) if status.success() => Ok(()),
        Ok(Ok(status)) => Err(status.to_string()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_) => {
            terminate(&mut child).await;
            Err(format!("timed out after {}s", timeout.as_secs_f64()))
        }
    };

    ProcessOutput {
        exit,
        stdout: collect(stdout_reader, &stdout).await,
        stderr: collect(stderr_reader, &stderr).await,
    }
}

/// Kills the child's whole process group, then reaps the child.
#[cfg(unix)]
async fn terminate(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Some(group) = child.id().and_then(|id| i32::try_from(id).ok()) {
        match killpg(Pid::from_raw(group), Signal::SIGKILL) {
            Ok(()) => {
                if let Err(err) = child.wait().await {
                    warn!(error = %err, "failed to reap timed-out process");
                }
                return;
            }
            Err(err) => warn!(error = %err, "failed to kill timed-out process group"),
        }
    }
    if let Err(err) = child.kill().await {
        warn!(error = %err, "failed to kill timed-out process");
    }
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child) {
    if let Err(err) = child.kill().await {
        warn!(error = %err, "failed to kill timed-out process");
    }
}

/// Bytes read from a pipe so far, shared with the reader task.
#[derive(Debug, Clone, Default)]
struct PipeBuffer(Arc<Mutex<Vec<u8>>>);

impl PipeBuffer {
    fn append(&self, bytes: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
    }

    fn text(&self) -> String {
        let buffer = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

async fn drain<R>(reader: Option<R>, buffer: PipeBuffer)
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = reader else {
        return;
    };
    let mut chunk = vec![0_u8; READ_CHUNK];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => buffer.append(chunk.get(..read).unwrap_or_default()),
            Err(err) => {
                debug!(error = %err, "pipe read ended early");
                break;
            }
        }
    }
}

/// Waits briefly for a pipe reader, then returns whatever it captured.
///
/// A descendant holding the pipe open past the grace period only loses the
/// bytes it has not written yet.
async fn collect(mut reader: JoinHandle<()>, buffer: &PipeBuffer) -> String {
    match tokio::time::timeout(DRAIN_GRACE, &mut reader).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(error = %err, "pipe reader panicked"),
        Err(_) => {
            debug!("pipe still open after the grace period");
            reader.abort();
        }
    }
    buffer.text()
}

/// Combines the exit error with captured stderr.
#[must_use]
pub fn format_error(exit_error: &str, stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        exit_error.to_owned()
    } else {
        format!("{exit_error}: {stderr}")
    }
}

/// Finds a session token in tool output.
///
/// Lines mentioning a session are parsed as JSON objects carrying a string
/// `session_id` field; the first hit wins. Returns an empty string when none
/// is found.
#[must_use]
pub fn extract_session_id(output: &str) -> String {
    output
        .lines()
        .filter(|line| line.to_ascii_lowercase().contains("session"))
        .find_map(|line| {
            let record: Value = serde_json::from_str(line.trim()).ok()?;
            record
                .get("session_id")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_default()
}

/// Escapes a value for display as a POSIX shell word.
///
/// Uses single-quote wrapping and the standard `'\''` sequence for embedded
/// quotes. Words made only of safe characters are left bare.
#[must_use]
pub fn shell_escape(value: &str) -> String {
    let is_safe = !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '='));
    if is_safe {
        return value.to_owned();
    }
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            escaped.push_str("'\\''");
        } else {
            escaped.push(ch);
        }
    }
    escaped.push('\'');
    escaped
}
