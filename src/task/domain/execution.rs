//! Outcome of a single run of the external tool.

use super::{TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum number of error characters kept in a failure summary.
pub const ERROR_SUMMARY_LIMIT: usize = 200;

/// Maximum number of output characters kept in a success summary.
pub const OUTPUT_SUMMARY_LIMIT: usize = 500;

/// Result of one executor invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Task that was executed.
    pub task_id: TaskId,
    /// Whether the tool exited successfully within its deadline.
    pub success: bool,
    /// Captured standard output.
    pub output: String,
    /// Failure detail; empty on success.
    pub error: String,
    /// Continuation token reported by the tool; empty when none was found.
    pub session_id: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub ended_at: DateTime<Utc>,
}

impl Execution {
    /// Elapsed wall-clock time of the run.
    #[must_use]
    pub fn duration(&self) -> Duration {
        (self.ended_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Bounded digest used for the board result field and comments.
    ///
    /// Failures keep at most [`ERROR_SUMMARY_LIMIT`] characters of the error,
    /// successes at most [`OUTPUT_SUMMARY_LIMIT`] characters of the output.
    /// Truncated text ends with `...`.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.success {
            truncate_chars(&self.output, OUTPUT_SUMMARY_LIMIT)
        } else {
            format!("Error: {}", truncate_chars(&self.error, ERROR_SUMMARY_LIMIT))
        }
    }

    /// Status the task moves to after this run.
    ///
    /// Failed runs land in review too: a human triages them, nothing retries.
    #[must_use]
    pub const fn new_status(&self) -> TaskStatus {
        TaskStatus::InReview
    }

    /// Returns the session token, if the tool reported one.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        (!self.session_id.is_empty()).then_some(self.session_id.as_str())
    }
}

/// Keeps the first `limit` characters of `text`, appending `...` when cut.
#[must_use]
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => format!("{}...", text.get(..byte_index).unwrap_or(text)),
        None => text.to_owned(),
    }
}
