//! Record of best-effort board writes made while processing a task.

use std::fmt;
use tracing::warn;

/// Board write performed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteStep {
    /// Status moved to the running state.
    MarkInProgress,
    /// Status, result, session and date written after the run.
    UpdateTask,
    /// Summary comment posted on the linked thread.
    AddComment,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MarkInProgress => "mark in progress",
            Self::UpdateTask => "update task",
            Self::AddComment => "add comment",
        })
    }
}

/// Outcome of a single write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was accepted.
    Ok,
    /// The write failed with the given message.
    Failed(String),
}

/// One attempted write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAttempt {
    /// Which write was attempted.
    pub step: WriteStep,
    /// What happened.
    pub outcome: WriteOutcome,
}

/// Ordered list of write attempts for one task.
///
/// Failures never stop later writes or later tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    attempts: Vec<WriteAttempt>,
}

impl WriteReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the result of `step`, logging failures as warnings.
    pub fn record<E>(&mut self, step: WriteStep, result: Result<(), E>)
    where
        E: fmt::Display,
    {
        let outcome = match result {
            Ok(()) => WriteOutcome::Ok,
            Err(err) => {
                warn!(%step, error = %err, "board write failed");
                WriteOutcome::Failed(err.to_string())
            }
        };
        self.attempts.push(WriteAttempt { step, outcome });
    }

    /// Returns every attempt in order.
    #[must_use]
    pub fn attempts(&self) -> &[WriteAttempt] {
        &self.attempts
    }

    /// Returns the steps that failed, in order.
    #[must_use]
    pub fn failed_steps(&self) -> Vec<WriteStep> {
        self.attempts
            .iter()
            .filter(|attempt| matches!(attempt.outcome, WriteOutcome::Failed(_)))
            .map(|attempt| attempt.step)
            .collect()
    }

    /// Returns `true` when every attempted write succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed_steps().is_empty()
    }

    /// Returns `true` when nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}
