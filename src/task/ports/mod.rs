//! Port contracts for the task pipeline.
//!
//! Ports define infrastructure-agnostic interfaces used by the orchestrator:
//! the task board, the external tool, and the notification side channel.

pub mod executor;
pub mod notifier;
pub mod store;

pub use executor::{DEFAULT_TIMEOUT, ExecuteOptions, ExecutorError, ExecutorResult, TaskExecutor};
pub use notifier::{Notification, Notifier, NotifierError, NotifierResult};
pub use store::{TaskStore, TaskStoreError, TaskStoreResult};
