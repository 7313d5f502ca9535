//! Error types for task domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task identifier is empty after trimming.
    #[error("task identifier must not be empty")]
    EmptyTaskId,

    /// The repository name does not follow `owner/repo` format.
    #[error("invalid repository name '{0}', expected owner/repo")]
    InvalidRepository(String),

    /// The issue number is invalid.
    #[error("invalid issue number {0}, expected a positive integer")]
    InvalidIssueNumber(u64),

    /// The issue URL does not point at a GitHub issue or pull request.
    #[error("invalid issue URL '{0}', expected https://github.com/owner/repo/issues/N")]
    InvalidIssueUrl(String),

    /// A board field value has a different kind than the logical field.
    #[error("field '{field}' expected a {expected} value, found {found}")]
    FieldKindMismatch {
        /// Board field name.
        field: &'static str,
        /// Kind the logical field requires.
        expected: &'static str,
        /// Kind that was supplied.
        found: &'static str,
    },
}
