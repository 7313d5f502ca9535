//! Shared test helpers for in-memory board integration tests.

use mockable::DefaultClock;
use rstest::fixture;
use std::path::Path;
use std::sync::{Arc, Mutex};
use vibe_runner::task::{
    adapters::{claude::ClaudeExecutor, memory::InMemoryTaskStore},
    domain::{Task, TaskId, TaskStatus},
    ports::{Notification, Notifier, NotifierResult},
    services::{Orchestrator, OrchestratorConfig},
};

/// Thread linked to the `linked` task.
pub const ISSUE_URL: &str = "https://github.com/acme/widgets/issues/11";

/// First message of the linked thread.
pub const THREAD_PROMPT: &str = "Add a health endpoint.";

/// Orchestrator wired to the in-memory board and the real executor.
pub type BoardOrchestrator =
    Orchestrator<InMemoryTaskStore, ClaudeExecutor<DefaultClock>, RecordingNotifier, DefaultClock>;

/// Notifier that keeps every notification.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Returns the notifications sent so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn sent(&self) -> Result<Vec<Notification>, eyre::Report> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .map_err(|_| eyre::eyre!("notifier lock poisoned"))
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> NotifierResult<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        Ok(())
    }
}

/// Parses a task identifier.
///
/// # Errors
///
/// Returns an error if the identifier is blank.
pub fn task_id(raw: &str) -> Result<TaskId, eyre::Report> {
    Ok(TaskId::new(raw)?)
}

/// Provides a board with one inline task, one issue-linked task, and one
/// finished task.
///
/// The linked task has no working directory so it picks up the default.
///
/// # Errors
///
/// Returns an error if seeding the board fails.
#[fixture]
pub fn board() -> Result<Arc<InMemoryTaskStore>, eyre::Report> {
    let store = InMemoryTaskStore::new();
    store.insert(
        Task::new(task_id("inline")?, "Inline prompt")
            .with_prompt("fix the parser")
            .with_work_dir(std::env::temp_dir()),
    )?;
    store.insert(Task::new(task_id("linked")?, "Linked issue").with_issue_url(ISSUE_URL))?;
    store.insert(
        Task::new(task_id("finished")?, "Already done")
            .with_status(TaskStatus::Done)
            .with_prompt("nothing to do")
            .with_work_dir(std::env::temp_dir()),
    )?;
    store.add_thread_messages(ISSUE_URL, [THREAD_PROMPT])?;
    Ok(Arc::new(store))
}

/// Builds an orchestrator over `store` running `binary`.
#[must_use]
pub fn orchestrator(
    store: &Arc<InMemoryTaskStore>,
    binary: &str,
    config: OrchestratorConfig,
) -> (BoardOrchestrator, Arc<RecordingNotifier>) {
    let clock = Arc::new(DefaultClock);
    let notifier = Arc::new(RecordingNotifier::default());
    let executor = ClaudeExecutor::new(binary, Arc::clone(&clock));
    let orchestrator = Orchestrator::new(
        Arc::clone(store),
        Arc::new(executor),
        Arc::clone(&notifier),
        clock,
        config,
    );
    (orchestrator, notifier)
}

/// Writes an executable shell script standing in for `claude`.
///
/// # Errors
///
/// Returns an error if the script cannot be written.
#[cfg(unix)]
pub fn fake_claude(dir: &Path, body: &str) -> Result<String, eyre::Report> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-claude");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path.display().to_string())
}

/// Returns a config using `work_dir` for tasks without one.
#[must_use]
pub fn config_in(work_dir: &Path) -> OrchestratorConfig {
    OrchestratorConfig {
        default_work_dir: work_dir.to_path_buf(),
        ..OrchestratorConfig::default()
    }
}
