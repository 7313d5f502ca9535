//! Application services driving tasks through the pipeline.

mod comment;
mod orchestrator;
mod writes;

pub use comment::{COMMENT_MAX_CHARS, COMMENT_MAX_LINES, comment_digest, render_comment};
pub use orchestrator::{
    BatchReport, DEFAULT_WATCH_INTERVAL, Orchestrator, OrchestratorConfig, OrchestratorError,
    OrchestratorResult, RunTarget, TaskOutcome, TaskReport, WatchSummary,
};
pub use writes::{WriteAttempt, WriteOutcome, WriteReport, WriteStep};
