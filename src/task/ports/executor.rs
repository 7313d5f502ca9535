//! Executor port for running one task through the external tool.

use crate::task::domain::{Execution, Task, TaskId};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Default per-task deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Result type for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Options for one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Describe the command instead of running it.
    pub dry_run: bool,
    /// Deadline after which the subprocess is killed.
    pub timeout: Duration,
    /// Session to resume; overrides the token stored on the task.
    pub session_id: Option<String>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            timeout: DEFAULT_TIMEOUT,
            session_id: None,
        }
    }
}

impl ExecuteOptions {
    /// Enables or disables dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the session to resume. Blank tokens are ignored.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        let token = session_id.into();
        self.session_id = (!token.trim().is_empty()).then_some(token);
        self
    }

    /// Session token to resume for `task`: the override, else the task's own.
    #[must_use]
    pub fn resume_token<'a>(&'a self, task: &'a Task) -> Option<&'a str> {
        self.session_id.as_deref().or_else(|| task.session_id())
    }
}

/// Runs tasks through the external tool.
///
/// A run that fails (non-zero exit, timeout, spawn failure) is reported as an
/// [`Execution`] with `success == false`; `Err` means no attempt was made.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Executes one task.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the task or options make an attempt
    /// impossible.
    async fn execute(&self, task: &Task, options: &ExecuteOptions) -> ExecutorResult<Execution>;

    /// Checks that the external tool can be started.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::NotInstalled`] when it cannot.
    async fn check_installed(&self) -> ExecutorResult<()>;
}

/// Reasons an execution could not even be attempted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// The task has no working directory.
    #[error("task {0} has no working directory")]
    EmptyWorkDir(TaskId),

    /// The task has no prompt.
    #[error("task {0} has no prompt")]
    EmptyPrompt(TaskId),

    /// The deadline is zero.
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// The external tool cannot be started.
    #[error("{binary} command not found: {reason}")]
    NotInstalled {
        /// Binary that was checked.
        binary: String,
        /// Probe failure detail.
        reason: String,
    },
}
