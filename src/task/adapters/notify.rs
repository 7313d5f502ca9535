//! Desktop notification adapters.

use crate::task::ports::{Notification, Notifier, NotifierError, NotifierResult};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// Notifier that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: &Notification) -> NotifierResult<()> {
        Ok(())
    }
}

/// macOS notifier backed by `osascript`.
#[derive(Debug, Clone)]
pub struct OsascriptNotifier {
    program: String,
}

impl Default for OsascriptNotifier {
    fn default() -> Self {
        Self {
            program: "osascript".to_owned(),
        }
    }
}

impl OsascriptNotifier {
    /// Builds the AppleScript statement for a notification.
    #[must_use]
    pub fn script(notification: &Notification) -> String {
        format!(
            "display notification \"{}\" with title \"{}\"",
            applescript_escape(&notification.body()),
            applescript_escape(notification.headline()),
        )
    }
}

#[async_trait]
impl Notifier for OsascriptNotifier {
    async fn notify(&self, notification: &Notification) -> NotifierResult<()> {
        let status = Command::new(&self.program)
            .arg("-e")
            .arg(Self::script(notification))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(NotifierError::delivery)?;
        if status.success() {
            Ok(())
        } else {
            Err(NotifierError::delivery(std::io::Error::other(format!(
                "{} exited with {status}",
                self.program
            ))))
        }
    }
}

fn applescript_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Chooses the notifier for the running platform.
///
/// Returns [`NoopNotifier`] when notifications are disabled or the platform
/// has no supported notification channel.
#[must_use]
pub fn select_notifier(enabled: bool) -> Arc<dyn Notifier> {
    if enabled && std::env::consts::OS == "macos" {
        debug!("desktop notifications via osascript");
        Arc::new(OsascriptNotifier::default())
    } else {
        Arc::new(NoopNotifier)
    }
}
