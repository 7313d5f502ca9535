//! Shared world state for task run BDD scenarios.

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use tempfile::TempDir;
use vibe_runner::task::{
    adapters::{claude::ClaudeExecutor, memory::InMemoryTaskStore, notify::NoopNotifier},
    services::{BatchReport, Orchestrator, OrchestratorConfig},
};

/// Orchestrator type used by the BDD world.
pub type TestOrchestrator =
    Orchestrator<InMemoryTaskStore, ClaudeExecutor<DefaultClock>, NoopNotifier, DefaultClock>;

/// Scenario world for task run behaviour tests.
pub struct TaskRunWorld {
    /// Board under test.
    pub store: Arc<InMemoryTaskStore>,
    /// Scratch directory holding the scripted tool and task work dirs.
    pub dir: TempDir,
    /// Path of the tool the orchestrator runs.
    pub binary: String,
    /// Whether the next run is a dry run.
    pub dry_run: bool,
    /// Report of the most recent run.
    pub last_report: Option<BatchReport>,
}

impl TaskRunWorld {
    /// Creates a world with an empty board and no usable tool.
    ///
    /// # Panics
    ///
    /// Panics if the scratch directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryTaskStore::new()),
            dir: tempfile::tempdir().expect("scenario temp dir"),
            binary: "/nonexistent/claude".to_owned(),
            dry_run: false,
            last_report: None,
        }
    }

    /// Installs a shell script as the tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the script cannot be written.
    pub fn install_tool(&mut self, body: &str) -> Result<(), eyre::Report> {
        let path = self.dir.path().join("fake-claude");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        self.binary = path.display().to_string();
        Ok(())
    }

    /// Builds an orchestrator for the current world settings.
    #[must_use]
    pub fn orchestrator(&self) -> TestOrchestrator {
        let clock = Arc::new(DefaultClock);
        let config = OrchestratorConfig {
            dry_run: self.dry_run,
            default_work_dir: self.dir.path().to_path_buf(),
            ..OrchestratorConfig::default()
        };
        Orchestrator::new(
            Arc::clone(&self.store),
            Arc::new(ClaudeExecutor::new(self.binary.clone(), Arc::clone(&clock))),
            Arc::new(NoopNotifier),
            clock,
            config,
        )
    }
}

impl Default for TaskRunWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> TaskRunWorld {
    TaskRunWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
