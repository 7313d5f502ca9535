//! Task orchestration: single-shot runs and the continuous watch loop.

use super::comment::render_comment;
use super::writes::{WriteReport, WriteStep};
use crate::task::{
    domain::{Execution, Task, TaskFilter, TaskId},
    ports::{
        DEFAULT_TIMEOUT, ExecuteOptions, ExecutorError, Notification, Notifier, TaskExecutor,
        TaskStore, TaskStoreError,
    },
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default delay between watch polls.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(300);

const MIN_WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Settings fixed for the lifetime of an [`Orchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Per-task deadline.
    pub timeout: Duration,
    /// Describe executions instead of running them; no board writes.
    pub dry_run: bool,
    /// Session to resume for every task, overriding stored tokens.
    pub session_id: Option<String>,
    /// Post a summary comment on linked threads.
    pub post_comments: bool,
    /// Working directory for tasks that have none.
    pub default_work_dir: PathBuf,
    /// Delay between watch polls.
    pub watch_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            dry_run: false,
            session_id: None,
            post_comments: true,
            default_work_dir: PathBuf::new(),
            watch_interval: DEFAULT_WATCH_INTERVAL,
        }
    }
}

/// Which tasks a single-shot run processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    /// One task, by identifier.
    Task(TaskId),
    /// Every task in the not-yet-started state, in board order.
    AllReady,
    /// The first executable task in the not-yet-started state.
    FirstReady,
}

/// What happened to one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task was not executable and was left untouched.
    Skipped,
    /// The prompt could not be loaded from the linked thread.
    PromptUnavailable(String),
    /// The executor refused to attempt the task.
    ExecutorRejected(ExecutorError),
    /// The tool ran; the execution says whether it succeeded.
    Executed(Execution),
}

/// Per-task result of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    /// Task as processed, including any prompt loaded from its thread.
    pub task: Task,
    /// Outcome of processing.
    pub outcome: TaskOutcome,
    /// Board writes attempted for the task.
    pub writes: WriteReport,
}

impl TaskReport {
    /// Returns the execution, when the tool ran.
    #[must_use]
    pub const fn execution(&self) -> Option<&Execution> {
        match &self.outcome {
            TaskOutcome::Executed(execution) => Some(execution),
            _ => None,
        }
    }
}

/// Result of one run or one watch poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// Per-task reports, in processing order.
    pub tasks: Vec<TaskReport>,
}

impl BatchReport {
    /// Number of tasks the tool actually ran.
    #[must_use]
    pub fn executed_count(&self) -> usize {
        self.executions().count()
    }

    /// Number of executions that succeeded.
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.executions().filter(|execution| execution.success).count()
    }

    /// Number of executions that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.executed_count() - self.succeeded_count()
    }

    /// Returns the executions, in processing order.
    pub fn executions(&self) -> impl Iterator<Item = &Execution> {
        self.tasks.iter().filter_map(TaskReport::execution)
    }

    /// Returns `true` when no task was processed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Totals accumulated over a watch session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    /// Polls started.
    pub polls: usize,
    /// Polls whose board read failed.
    pub failed_polls: usize,
    /// Tasks the tool ran.
    pub executed: usize,
    /// Executions that failed.
    pub failed: usize,
}

impl WatchSummary {
    fn absorb(&mut self, report: &BatchReport) {
        self.executed += report.executed_count();
        self.failed += report.failed_count();
    }
}

/// Errors that stop a run before or while selecting tasks.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The external tool is not usable.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    /// The task board could not be read.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
}

/// Result type for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Drives tasks from the board through the executor and back.
///
/// Tasks run strictly one at a time. Results for one task are written
/// before the next task starts.
pub struct Orchestrator<S, E, N, C>
where
    S: TaskStore + ?Sized,
    E: TaskExecutor + ?Sized,
    N: Notifier + ?Sized,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    executor: Arc<E>,
    notifier: Arc<N>,
    clock: Arc<C>,
    config: OrchestratorConfig,
}

impl<S, E, N, C> Orchestrator<S, E, N, C>
where
    S: TaskStore + ?Sized,
    E: TaskExecutor + ?Sized,
    N: Notifier + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates an orchestrator over the given collaborators.
    #[must_use]
    pub const fn new(
        store: Arc<S>,
        executor: Arc<E>,
        notifier: Arc<N>,
        clock: Arc<C>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            executor,
            notifier,
            clock,
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Checks the external tool (outside dry run) and initializes the store.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Executor`] when the timeout is zero or
    /// the tool is missing, and [`OrchestratorError::Store`] when the board
    /// cannot be resolved.
    pub async fn prepare(&self) -> OrchestratorResult<()> {
        self.check_timeout()?;
        if !self.config.dry_run {
            self.executor.check_installed().await?;
        }
        self.store.initialize().await?;
        Ok(())
    }

    /// Processes the selected tasks once.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Executor`] for a zero timeout, before
    /// the board is touched, and [`OrchestratorError::Store`] when the board
    /// read fails. Per-task failures are reported in the [`BatchReport`].
    pub async fn run(&self, target: RunTarget) -> OrchestratorResult<BatchReport> {
        self.check_timeout()?;
        let started_at = self.clock.utc();
        let tasks = match target {
            RunTarget::Task(id) => vec![self.store.get_task(&id).await?],
            RunTarget::AllReady => self.store.get_tasks(&TaskFilter::ready()).await?,
            RunTarget::FirstReady => self.executable_ready_tasks().await?.into_iter().take(1).collect(),
        };
        if tasks.is_empty() {
            info!("no ready tasks found");
        }

        let mut reports = Vec::with_capacity(tasks.len());
        for task in tasks {
            reports.push(self.process(task).await);
        }
        Ok(BatchReport {
            started_at,
            tasks: reports,
        })
    }

    /// Polls the board until `cancel` fires.
    ///
    /// The first poll starts immediately. A failed board read is logged and
    /// retried at the next tick. Cancellation is observed between tasks and
    /// between ticks; a running task is allowed to finish.
    pub async fn watch(&self, cancel: &CancellationToken) -> WatchSummary {
        let period = self.config.watch_interval.max(MIN_WATCH_INTERVAL);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "watching for ready tasks");

        let mut summary = WatchSummary::default();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            summary.polls += 1;
            match self.poll(cancel).await {
                Ok(report) => summary.absorb(&report),
                Err(err) => {
                    summary.failed_polls += 1;
                    warn!(error = %err, "poll failed; retrying at next tick");
                }
            }
        }
        info!(
            polls = summary.polls,
            executed = summary.executed,
            failed = summary.failed,
            "watch stopped"
        );
        summary
    }

    /// Runs [`Orchestrator::watch`] until Ctrl-C (or SIGTERM on Unix).
    pub async fn watch_until_interrupted(&self) -> WatchSummary {
        let cancel = CancellationToken::new();
        let listener = tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));
        let summary = self.watch(&cancel).await;
        listener.abort();
        summary
    }

    async fn poll(&self, cancel: &CancellationToken) -> OrchestratorResult<BatchReport> {
        self.check_timeout()?;
        let started_at = self.clock.utc();
        let tasks = self.executable_ready_tasks().await?;
        debug!(count = tasks.len(), "executable tasks found");

        let mut reports = Vec::with_capacity(tasks.len());
        for task in tasks {
            if cancel.is_cancelled() {
                info!("cancellation requested; leaving remaining tasks");
                break;
            }
            reports.push(self.process(task).await);
        }
        Ok(BatchReport {
            started_at,
            tasks: reports,
        })
    }

    /// Rejects a zero timeout before any task is marked in progress.
    const fn check_timeout(&self) -> OrchestratorResult<()> {
        if self.config.timeout.is_zero() {
            return Err(OrchestratorError::Executor(ExecutorError::ZeroTimeout));
        }
        Ok(())
    }

    async fn executable_ready_tasks(&self) -> OrchestratorResult<Vec<Task>> {
        let tasks = self.store.get_tasks(&TaskFilter::ready()).await?;
        Ok(tasks
            .into_iter()
            .map(|mut task| {
                task.fill_work_dir(&self.config.default_work_dir);
                task
            })
            .filter(Task::is_executable)
            .collect())
    }

    fn execute_options(&self) -> ExecuteOptions {
        let options = ExecuteOptions::default()
            .with_dry_run(self.config.dry_run)
            .with_timeout(self.config.timeout);
        match &self.config.session_id {
            Some(session_id) => options.with_session_id(session_id.clone()),
            None => options,
        }
    }

    async fn process(&self, mut task: Task) -> TaskReport {
        task.fill_work_dir(&self.config.default_work_dir);
        let mut writes = WriteReport::new();

        if !task.is_executable() {
            info!(task_id = %task.id(), status = %task.status(), "skipping non-executable task");
            return TaskReport {
                task,
                outcome: TaskOutcome::Skipped,
                writes,
            };
        }

        if task.prompt_from_issue()
            && let Err(err) = self.store.load_task_prompt(&mut task).await
        {
            warn!(task_id = %task.id(), error = %err, "could not load prompt from thread");
            return TaskReport {
                task,
                outcome: TaskOutcome::PromptUnavailable(err.to_string()),
                writes,
            };
        }

        if !self.config.dry_run {
            writes.record(
                WriteStep::MarkInProgress,
                self.store.set_task_in_progress(task.id()).await,
            );
        }

        info!(task_id = %task.id(), title = %task.title(), "executing task");
        let execution = match self.executor.execute(&task, &self.execute_options()).await {
            Ok(execution) => execution,
            Err(err) => {
                warn!(task_id = %task.id(), error = %err, "executor rejected task");
                return TaskReport {
                    task,
                    outcome: TaskOutcome::ExecutorRejected(err),
                    writes,
                };
            }
        };

        if !self.config.dry_run {
            self.persist(&task, &execution, &mut writes).await;
            self.notify(&task, &execution).await;
        }
        TaskReport {
            task,
            outcome: TaskOutcome::Executed(execution),
            writes,
        }
    }

    async fn persist(&self, task: &Task, execution: &Execution, writes: &mut WriteReport) {
        writes.record(
            WriteStep::UpdateTask,
            self.store.update_task(task, execution).await,
        );
        if !self.config.post_comments || task.issue_url().is_none() {
            return;
        }
        let posted = match render_comment(execution) {
            Ok(body) => self
                .store
                .add_issue_comment(task, &body)
                .await
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        writes.record(WriteStep::AddComment, posted);
    }

    async fn notify(&self, task: &Task, execution: &Execution) {
        let notification = if execution.success {
            Notification::Success {
                title: task.title().to_owned(),
                duration: execution.duration(),
            }
        } else {
            Notification::Failure {
                title: task.title().to_owned(),
                error: execution.error.clone(),
            }
        };
        if let Err(err) = self.notifier.notify(&notification).await {
            debug!(error = %err, "notification not delivered");
        }
    }
}

async fn cancel_on_shutdown_signal(cancel: CancellationToken) {
    shutdown_signal().await;
    info!("shutdown requested; finishing current task");
    cancel.cancel();
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(err) = result {
                        warn!(error = %err, "Ctrl-C handler failed");
                        let _ = terminate.recv().await;
                    }
                }
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            warn!(error = %err, "SIGTERM handler unavailable");
            ctrl_c_or_pending().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    ctrl_c_or_pending().await;
}

async fn ctrl_c_or_pending() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Ctrl-C handler failed");
        std::future::pending::<()>().await;
    }
}
