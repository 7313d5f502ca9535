//! Board task value object and lifecycle status.

use super::TaskId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Task lifecycle status.
///
/// The board may carry options outside the lifecycle (for example a
/// `Backlog` column); those are kept verbatim as [`TaskStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task has not been started and may be picked up.
    Ready,
    /// Task is being executed.
    InProgress,
    /// Task has been executed and awaits a human.
    InReview,
    /// Task has been accepted.
    Done,
    /// Task has been rejected.
    Failed,
    /// Board option that is not part of the lifecycle.
    Other(String),
}

impl TaskStatus {
    /// Returns `true` for the single not-yet-started state.
    #[must_use]
    pub const fn is_not_started(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns `true` for states reached after an execution.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::InReview | Self::Done | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("ready"),
            Self::InProgress => f.write_str("in progress"),
            Self::InReview => f.write_str("in review"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Board option names used for each lifecycle status.
///
/// Deployments name their columns differently; the semantics stay fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusNames {
    /// Option name of [`TaskStatus::Ready`].
    pub ready: String,
    /// Option name of [`TaskStatus::InProgress`].
    pub in_progress: String,
    /// Option name of [`TaskStatus::InReview`].
    pub in_review: String,
    /// Option name of [`TaskStatus::Done`].
    pub done: String,
    /// Option name of [`TaskStatus::Failed`].
    pub failed: String,
}

impl Default for StatusNames {
    fn default() -> Self {
        Self {
            ready: "Ready".to_owned(),
            in_progress: "In progress".to_owned(),
            in_review: "In review".to_owned(),
            done: "Done".to_owned(),
            failed: "Failed".to_owned(),
        }
    }
}

impl StatusNames {
    /// Profile for boards built from the `Todo / In Progress / Done` template,
    /// where executed tasks land directly in `Done`.
    #[must_use]
    pub fn todo_board() -> Self {
        Self {
            ready: "Todo".to_owned(),
            in_progress: "In Progress".to_owned(),
            in_review: "Done".to_owned(),
            done: "Done".to_owned(),
            failed: "Failed".to_owned(),
        }
    }

    /// Maps a board option name onto a lifecycle status.
    ///
    /// Matching ignores ASCII case and surrounding whitespace. When two
    /// statuses share an option name, the earlier lifecycle state wins.
    #[must_use]
    pub fn parse(&self, option_name: &str) -> TaskStatus {
        let name = option_name.trim();
        let candidates = [
            (&self.ready, TaskStatus::Ready),
            (&self.in_progress, TaskStatus::InProgress),
            (&self.in_review, TaskStatus::InReview),
            (&self.done, TaskStatus::Done),
            (&self.failed, TaskStatus::Failed),
        ];
        candidates
            .into_iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map_or_else(|| TaskStatus::Other(name.to_owned()), |(_, status)| status)
    }

    /// Returns the board option name for a lifecycle status.
    #[must_use]
    pub fn name_of<'a>(&'a self, status: &'a TaskStatus) -> &'a str {
        match status {
            TaskStatus::Ready => self.ready.as_str(),
            TaskStatus::InProgress => self.in_progress.as_str(),
            TaskStatus::InReview => self.in_review.as_str(),
            TaskStatus::Done => self.done.as_str(),
            TaskStatus::Failed => self.failed.as_str(),
            TaskStatus::Other(name) => name.as_str(),
        }
    }
}

/// A unit of work held on the task board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: String,
    status: TaskStatus,
    prompt: String,
    work_dir: PathBuf,
    result: String,
    session_id: Option<String>,
    executed_at: Option<NaiveDate>,
    issue_url: Option<String>,
}

impl Task {
    /// Creates a ready task with no prompt, working directory, or history.
    #[must_use]
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            status: TaskStatus::Ready,
            prompt: String::new(),
            work_dir: PathBuf::new(),
            result: String::new(),
            session_id: None,
            executed_at: None,
            issue_url: None,
        }
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Sets the last execution summary.
    #[must_use]
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = result.into();
        self
    }

    /// Sets the stored session token. Blank tokens are ignored.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        let token = session_id.into();
        self.session_id = (!token.trim().is_empty()).then_some(token);
        self
    }

    /// Sets the date of the last execution.
    #[must_use]
    pub fn with_executed_at(mut self, executed_at: NaiveDate) -> Self {
        self.executed_at = Some(executed_at);
        self
    }

    /// Links the task to a discussion thread.
    #[must_use]
    pub fn with_issue_url(mut self, issue_url: impl Into<String>) -> Self {
        let url = issue_url.into();
        self.issue_url = (!url.trim().is_empty()).then_some(url);
        self
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> &TaskId {
        &self.id
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> &TaskStatus {
        &self.status
    }

    /// Returns the prompt.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Returns the working directory.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Returns the last execution summary.
    #[must_use]
    pub fn result(&self) -> &str {
        &self.result
    }

    /// Returns the stored session token, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Returns the date of the last execution, if any.
    #[must_use]
    pub const fn executed_at(&self) -> Option<NaiveDate> {
        self.executed_at
    }

    /// Returns the linked thread URL, if any.
    #[must_use]
    pub fn issue_url(&self) -> Option<&str> {
        self.issue_url.as_deref()
    }

    /// Returns `true` when the prompt is sourced from the linked thread.
    #[must_use]
    pub const fn prompt_from_issue(&self) -> bool {
        self.issue_url.is_some()
    }

    /// Returns `true` when the task may be handed to the executor.
    ///
    /// The task must be not-yet-started, have a prompt or a linked thread to
    /// load one from, and have a working directory.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        let has_prompt_source = !self.prompt.trim().is_empty() || self.issue_url.is_some();
        self.status.is_not_started()
            && has_prompt_source
            && !self.work_dir.as_os_str().is_empty()
    }

    /// Replaces the prompt, typically after loading it from the thread.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Sets the working directory when none is configured.
    pub fn fill_work_dir(&mut self, default_dir: &Path) {
        if self.work_dir.as_os_str().is_empty() {
            default_dir.clone_into(&mut self.work_dir);
        }
    }
}

/// Selection criteria for board reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Only return tasks in this status.
    pub status: Option<TaskStatus>,
    /// Return at most this many tasks.
    pub limit: Option<usize>,
}

impl TaskFilter {
    /// Filter matching every task.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter matching not-yet-started tasks.
    #[must_use]
    pub const fn ready() -> Self {
        Self {
            status: Some(TaskStatus::Ready),
            limit: None,
        }
    }

    /// Limits the number of returned tasks.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` when the task satisfies the status predicate.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.status
            .as_ref()
            .is_none_or(|status| task.status() == status)
    }

    /// Applies the filter to an ordered task list, preserving order.
    #[must_use]
    pub fn apply(&self, tasks: impl IntoIterator<Item = Task>) -> Vec<Task> {
        let matching = tasks.into_iter().filter(|task| self.matches(task));
        match self.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }
}
