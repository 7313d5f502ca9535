//! Domain model for board tasks and their executions.
//!
//! The task domain models board items, the outcome of running the external
//! tool on them, and the board field schema, while keeping all
//! infrastructure concerns outside of the domain boundary.

mod error;
mod execution;
mod field;
mod ids;
mod issue;
mod task;
mod thread;

pub use error::TaskDomainError;
pub use execution::{ERROR_SUMMARY_LIMIT, Execution, OUTPUT_SUMMARY_LIMIT, truncate_chars};
pub use field::{BoardField, BoardSchema, FieldKind, FieldOption, FieldValue, LogicalField};
pub use ids::{IssueNumber, RepositoryFullName, TaskId};
pub use issue::IssueRef;
pub use task::{StatusNames, Task, TaskFilter, TaskStatus};
pub use thread::{COMMENT_HEADER, PROMPT_DIVIDER, is_own_comment, prompt_from_thread};
