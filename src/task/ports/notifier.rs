//! Notification side channel for finished runs.

use crate::task::domain::truncate_chars;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Characters of error text kept in a failure notification.
const ERROR_PREVIEW_LIMIT: usize = 50;

/// Result type for notifier operations.
pub type NotifierResult<T> = Result<T, NotifierError>;

/// Event shown to the local user when a task finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The task ran successfully.
    Success {
        /// Task title.
        title: String,
        /// Run duration.
        duration: Duration,
    },
    /// The task run failed.
    Failure {
        /// Task title.
        title: String,
        /// Error text.
        error: String,
    },
}

impl Notification {
    /// Notification headline.
    #[must_use]
    pub const fn headline(&self) -> &'static str {
        match self {
            Self::Success { .. } => "✅ vibe: Task Completed",
            Self::Failure { .. } => "❌ vibe: Task Failed",
        }
    }

    /// Notification body: the title plus duration or a short error.
    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::Success { title, duration } => {
                format!("{title} ({:.1}s)", duration.as_secs_f64())
            }
            Self::Failure { title, error } => {
                format!("{title}: {}", truncate_chars(error, ERROR_PREVIEW_LIMIT))
            }
        }
    }
}

/// Delivers notifications. Delivery is best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Shows a notification.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError`] when delivery fails; callers ignore it.
    async fn notify(&self, notification: &Notification) -> NotifierResult<()>;
}

/// Notification delivery failure.
#[derive(Debug, Clone, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifierError(pub Arc<dyn std::error::Error + Send + Sync>);

impl NotifierError {
    /// Wraps a delivery error.
    pub fn delivery(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }
}
