//! Task board port: reads, status/result writes, and thread comments.

use crate::task::domain::{
    BoardSchema, Execution, LogicalField, Task, TaskDomainError, TaskFilter, TaskId,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Task board contract consumed by the orchestrator.
///
/// Implementations cache the board schema in [`TaskStore::initialize`]; every
/// other operation requires it to have run.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Resolves and caches the board schema.
    ///
    /// # Errors
    ///
    /// Returns a store error when the board or its fields cannot be read.
    async fn initialize(&self) -> TaskStoreResult<()>;

    /// Returns the cached board schema.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotInitialized`] before initialization.
    fn schema(&self) -> TaskStoreResult<BoardSchema>;

    /// Returns tasks matching the filter, in board order.
    ///
    /// # Errors
    ///
    /// Returns a store error when the board cannot be read.
    async fn get_tasks(&self, filter: &TaskFilter) -> TaskStoreResult<Vec<Task>>;

    /// Returns a single task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist.
    async fn get_task(&self, id: &TaskId) -> TaskStoreResult<Task>;

    /// Replaces the task prompt with the content of its linked thread.
    ///
    /// Messages posted by this system are left out; the remaining messages
    /// are joined with a visible divider.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NoLinkedIssue`] when the task has no thread
    /// and [`TaskStoreError::EmptyThread`] when nothing is left to use.
    async fn load_task_prompt(&self, task: &mut Task) -> TaskStoreResult<()>;

    /// Moves the task to the running state. Repeating the call is harmless.
    ///
    /// # Errors
    ///
    /// Returns a store error when the status write fails.
    async fn set_task_in_progress(&self, id: &TaskId) -> TaskStoreResult<()>;

    /// Writes status, result summary, session token (when present) and
    /// execution date for a finished run.
    ///
    /// Writes are not transactional: earlier fields may already be updated
    /// when a later one fails.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::FieldUpdate`] naming the first field that
    /// could not be written.
    async fn update_task(&self, task: &Task, execution: &Execution) -> TaskStoreResult<()>;

    /// Posts a comment on the task's linked thread.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NoLinkedIssue`] when the task has no thread.
    async fn add_issue_comment(&self, task: &Task, body: &str) -> TaskStoreResult<()>;
}

/// Errors returned by task store implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskStoreError {
    /// An operation ran before [`TaskStore::initialize`].
    #[error("task store is not initialized")]
    NotInitialized,

    /// The task was not found on the board.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The task has no linked discussion thread.
    #[error("task {0} has no associated issue")]
    NoLinkedIssue(TaskId),

    /// The linked thread holds no usable message.
    #[error("no comments found in issue for task {0}")]
    EmptyThread(TaskId),

    /// The board lacks a field this system needs.
    #[error("field not found: {0}")]
    MissingField(LogicalField),

    /// A single-select field lacks the requested option.
    #[error("option not found: {option} in field {field}")]
    MissingOption {
        /// Field that was searched.
        field: LogicalField,
        /// Option name that was requested.
        option: String,
    },

    /// Writing one field of a task failed.
    #[error("failed to update {field}: {source}")]
    FieldUpdate {
        /// Field whose write failed.
        field: LogicalField,
        /// Underlying failure.
        #[source]
        source: Box<TaskStoreError>,
    },

    /// Board data did not fit the domain model.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// Transport or backend failure.
    #[error("task board error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskStoreError {
    /// Wraps a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }

    /// Wraps a failure to write `field`.
    #[must_use]
    pub fn field_update(field: LogicalField, source: Self) -> Self {
        Self::FieldUpdate {
            field,
            source: Box::new(source),
        }
    }
}
