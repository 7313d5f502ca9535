//! Orchestrator tests against the in-memory board and a mocked executor.

use crate::task::{
    adapters::memory::{InMemoryTaskStore, RecordedWrite},
    domain::{Execution, LogicalField, Task, TaskId, TaskStatus},
    ports::{
        ExecuteOptions, ExecutorError, ExecutorResult, Notification, Notifier, NotifierResult,
        TaskExecutor, TaskStore,
    },
    services::{
        Orchestrator, OrchestratorConfig, OrchestratorError, RunTarget, TaskOutcome, WriteStep,
    },
};
use async_trait::async_trait;
use chrono::Utc;
use mockable::DefaultClock;
use mockall::mock;
use rstest::{fixture, rstest};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ISSUE_URL: &str = "https://github.com/acme/widgets/issues/3";

mock! {
    pub Executor {}

    #[async_trait]
    impl TaskExecutor for Executor {
        async fn execute(&self, task: &Task, options: &ExecuteOptions) -> ExecutorResult<Execution>;
        async fn check_installed(&self) -> ExecutorResult<()>;
    }
}

#[derive(Debug, Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> NotifierResult<()> {
        self.sent
            .lock()
            .expect("notifier lock")
            .push(notification.clone());
        Ok(())
    }
}

type TestOrchestrator = Orchestrator<InMemoryTaskStore, MockExecutor, RecordingNotifier, DefaultClock>;

struct Harness {
    store: Arc<InMemoryTaskStore>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn orchestrator(&self, executor: MockExecutor, config: OrchestratorConfig) -> TestOrchestrator {
        Orchestrator::new(
            Arc::clone(&self.store),
            Arc::new(executor),
            Arc::clone(&self.notifier),
            Arc::new(DefaultClock),
            config,
        )
    }

    fn add(&self, task: Task) {
        self.store.insert(task).expect("task inserted");
    }

    fn writes(&self) -> Vec<RecordedWrite> {
        self.store.writes().expect("writes readable")
    }
}

#[fixture]
async fn harness() -> Harness {
    let store = Arc::new(InMemoryTaskStore::new());
    store.initialize().await.expect("store initialized");
    Harness {
        store,
        notifier: Arc::new(RecordingNotifier::default()),
    }
}

fn task_id(raw: &str) -> TaskId {
    TaskId::new(raw).expect("valid task id")
}

fn ready(id: &str, prompt: &str) -> Task {
    Task::new(task_id(id), format!("Task {id}"))
        .with_prompt(prompt)
        .with_work_dir("/repo")
}

fn finished(task: &Task, success: bool) -> Execution {
    let now = Utc::now();
    Execution {
        task_id: task.id().clone(),
        success,
        output: if success { "all good".to_owned() } else { String::new() },
        error: if success {
            String::new()
        } else {
            "exit status: 1: boom".to_owned()
        },
        session_id: if success { "sess-1".to_owned() } else { String::new() },
        started_at: now,
        ended_at: now,
    }
}

fn live_config() -> OrchestratorConfig {
    OrchestratorConfig {
        default_work_dir: "/workspace".into(),
        ..OrchestratorConfig::default()
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn non_executable_tasks_never_reach_the_executor(#[future] harness: Harness) {
    let harness = harness.await;
    harness.add(ready("a", ""));
    let mut executor = MockExecutor::new();
    executor.expect_execute().never();
    let orchestrator = harness.orchestrator(executor, live_config());

    let report = orchestrator
        .run(RunTarget::AllReady)
        .await
        .expect("run succeeds");

    assert_eq!(report.executed_count(), 0);
    assert_eq!(report.tasks.len(), 1);
    assert_eq!(report.tasks[0].outcome, TaskOutcome::Skipped);
    assert!(harness.writes().is_empty());
    assert!(harness.notifier.sent().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dry_run_executes_without_writes_or_notifications(#[future] harness: Harness) {
    let harness = harness.await;
    harness.add(ready("a", "fix bug").with_issue_url(ISSUE_URL));
    harness
        .store
        .add_thread_messages(ISSUE_URL, ["fix bug"])
        .expect("thread");
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .withf(|_, options| options.dry_run)
        .times(1)
        .returning(|task, _| Ok(finished(task, true)));
    let config = OrchestratorConfig {
        dry_run: true,
        ..live_config()
    };
    let orchestrator = harness.orchestrator(executor, config);

    let report = orchestrator
        .run(RunTarget::FirstReady)
        .await
        .expect("run succeeds");

    assert_eq!(report.succeeded_count(), 1);
    assert!(report.tasks[0].writes.is_empty());
    assert!(harness.writes().is_empty());
    assert!(harness.notifier.sent().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn successful_run_updates_board_comments_and_notifies(#[future] harness: Harness) {
    let harness = harness.await;
    harness.add(ready("a", "").with_issue_url(ISSUE_URL));
    harness
        .store
        .add_thread_messages(ISSUE_URL, ["Please fix the widget."])
        .expect("thread");
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .withf(|task, _| task.prompt() == "Please fix the widget.")
        .times(1)
        .returning(|task, _| Ok(finished(task, true)));
    let orchestrator = harness.orchestrator(executor, live_config());

    let report = orchestrator
        .run(RunTarget::Task(task_id("a")))
        .await
        .expect("run succeeds");

    let task_report = &report.tasks[0];
    assert!(task_report.writes.all_succeeded());
    let steps: Vec<WriteStep> = task_report
        .writes
        .attempts()
        .iter()
        .map(|attempt| attempt.step)
        .collect();
    assert_eq!(
        steps,
        vec![
            WriteStep::MarkInProgress,
            WriteStep::UpdateTask,
            WriteStep::AddComment,
        ]
    );

    let stored = harness.store.get_task(&task_id("a")).await.expect("task");
    assert_eq!(stored.status(), &TaskStatus::InReview);
    assert_eq!(stored.session_id(), Some("sess-1"));
    let thread = harness.store.thread(ISSUE_URL).expect("thread");
    assert_eq!(thread.len(), 2);
    assert!(thread[1].starts_with("vibe project comment"));
    assert!(matches!(
        harness.notifier.sent().as_slice(),
        [Notification::Success { title, .. }] if title == "Task a"
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_run_still_moves_to_review(#[future] harness: Harness) {
    let harness = harness.await;
    harness.add(ready("a", "fix bug"));
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .times(1)
        .returning(|task, _| Ok(finished(task, false)));
    let orchestrator = harness.orchestrator(executor, live_config());

    let report = orchestrator
        .run(RunTarget::AllReady)
        .await
        .expect("run succeeds");

    assert_eq!(report.failed_count(), 1);
    let stored = harness.store.get_task(&task_id("a")).await.expect("task");
    assert_eq!(stored.status(), &TaskStatus::InReview);
    assert_eq!(stored.result(), "Error: exit status: 1: boom");
    assert!(matches!(
        harness.notifier.sent().as_slice(),
        [Notification::Failure { error, .. }] if error.ends_with(": boom")
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn write_failures_are_reported_and_the_batch_continues(#[future] harness: Harness) {
    let harness = harness.await;
    harness.add(ready("a", "first").with_issue_url(ISSUE_URL));
    harness.add(ready("b", "second"));
    harness
        .store
        .add_thread_messages(ISSUE_URL, ["first"])
        .expect("thread");
    harness
        .store
        .fail_field(LogicalField::Status)
        .expect("inject");
    harness.store.fail_comments(true).expect("inject");
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .times(2)
        .returning(|task, _| Ok(finished(task, true)));
    let orchestrator = harness.orchestrator(executor, live_config());

    let report = orchestrator
        .run(RunTarget::AllReady)
        .await
        .expect("run succeeds");

    assert_eq!(report.executed_count(), 2);
    assert_eq!(
        report.tasks[0].writes.failed_steps(),
        vec![
            WriteStep::MarkInProgress,
            WriteStep::UpdateTask,
            WriteStep::AddComment,
        ]
    );
    assert_eq!(
        report.tasks[1].writes.failed_steps(),
        vec![WriteStep::MarkInProgress, WriteStep::UpdateTask]
    );
    assert_eq!(harness.notifier.sent().len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn comments_can_be_disabled(#[future] harness: Harness) {
    let harness = harness.await;
    harness.add(ready("a", "").with_issue_url(ISSUE_URL));
    harness
        .store
        .add_thread_messages(ISSUE_URL, ["do it"])
        .expect("thread");
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .returning(|task, _| Ok(finished(task, true)));
    let config = OrchestratorConfig {
        post_comments: false,
        ..live_config()
    };
    let orchestrator = harness.orchestrator(executor, config);

    orchestrator
        .run(RunTarget::AllReady)
        .await
        .expect("run succeeds");

    assert_eq!(harness.store.thread(ISSUE_URL).expect("thread").len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unavailable_prompt_aborts_only_that_task(#[future] harness: Harness) {
    let harness = harness.await;
    harness.add(ready("a", "").with_issue_url(ISSUE_URL));
    harness.add(ready("b", "second"));
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .withf(|task, _| task.id().as_str() == "b")
        .times(1)
        .returning(|task, _| Ok(finished(task, true)));
    let orchestrator = harness.orchestrator(executor, live_config());

    let report = orchestrator
        .run(RunTarget::AllReady)
        .await
        .expect("run succeeds");

    assert!(matches!(
        report.tasks[0].outcome,
        TaskOutcome::PromptUnavailable(_)
    ));
    assert!(report.tasks[0].writes.is_empty());
    assert_eq!(report.executed_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn executor_rejection_is_reported_per_task(#[future] harness: Harness) {
    let harness = harness.await;
    harness.add(ready("a", "first"));
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .returning(|_, _| Err(ExecutorError::ZeroTimeout));
    let orchestrator = harness.orchestrator(executor, live_config());

    let report = orchestrator
        .run(RunTarget::AllReady)
        .await
        .expect("run succeeds");

    assert_eq!(
        report.tasks[0].outcome,
        TaskOutcome::ExecutorRejected(ExecutorError::ZeroTimeout)
    );
    assert!(harness.notifier.sent().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn zero_timeout_fails_the_run_before_any_task_is_marked(#[future] harness: Harness) {
    let harness = harness.await;
    harness.add(ready("a", "first"));
    harness.add(ready("b", "second"));
    let mut executor = MockExecutor::new();
    executor.expect_execute().never();
    let config = OrchestratorConfig {
        timeout: Duration::ZERO,
        ..live_config()
    };
    let orchestrator = harness.orchestrator(executor, config);

    let result = orchestrator.run(RunTarget::AllReady).await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Executor(ExecutorError::ZeroTimeout))
    ));
    assert!(harness.writes().is_empty());
    for id in ["a", "b"] {
        let task = harness.store.get_task(&task_id(id)).await.expect("task");
        assert_eq!(task.status(), &TaskStatus::Ready);
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn zero_timeout_fails_preparation(#[future] harness: Harness) {
    let harness = harness.await;
    let mut executor = MockExecutor::new();
    executor.expect_check_installed().never();
    let config = OrchestratorConfig {
        timeout: Duration::ZERO,
        ..live_config()
    };
    let orchestrator = harness.orchestrator(executor, config);

    let result = orchestrator.prepare().await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Executor(ExecutorError::ZeroTimeout))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn first_ready_skips_non_executable_tasks(#[future] harness: Harness) {
    let harness = harness.await;
    harness.add(ready("a", ""));
    harness.add(ready("b", "second").with_status(TaskStatus::Done));
    harness.add(ready("c", "third"));
    harness.add(ready("d", "fourth"));
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .withf(|task, _| task.id().as_str() == "c")
        .times(1)
        .returning(|task, _| Ok(finished(task, true)));
    let orchestrator = harness.orchestrator(executor, live_config());

    let report = orchestrator
        .run(RunTarget::FirstReady)
        .await
        .expect("run succeeds");

    assert_eq!(report.tasks.len(), 1);
    assert_eq!(report.tasks[0].task.id().as_str(), "c");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn explicit_task_outside_ready_is_skipped(#[future] harness: Harness) {
    let harness = harness.await;
    harness.add(ready("a", "first").with_status(TaskStatus::InReview));
    let mut executor = MockExecutor::new();
    executor.expect_execute().never();
    let orchestrator = harness.orchestrator(executor, live_config());

    let report = orchestrator
        .run(RunTarget::Task(task_id("a")))
        .await
        .expect("run succeeds");

    assert_eq!(report.tasks[0].outcome, TaskOutcome::Skipped);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn default_work_dir_and_session_override_reach_the_executor(#[future] harness: Harness) {
    let harness = harness.await;
    harness.add(Task::new(task_id("a"), "No dir").with_prompt("first"));
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .withf(|task, options| {
            task.work_dir() == std::path::Path::new("/workspace")
                && options.resume_token(task) == Some("resume-me")
                && options.timeout == Duration::from_secs(90)
        })
        .times(1)
        .returning(|task, _| Ok(finished(task, true)));
    let config = OrchestratorConfig {
        session_id: Some("resume-me".to_owned()),
        timeout: Duration::from_secs(90),
        ..live_config()
    };
    let orchestrator = harness.orchestrator(executor, config);

    let report = orchestrator
        .run(RunTarget::AllReady)
        .await
        .expect("run succeeds");

    assert_eq!(report.executed_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn board_read_failure_stops_the_run(#[future] harness: Harness) {
    let harness = harness.await;
    harness.store.fail_reads(true).expect("inject");
    let orchestrator = harness.orchestrator(MockExecutor::new(), live_config());

    let result = orchestrator.run(RunTarget::AllReady).await;

    assert!(matches!(result, Err(OrchestratorError::Store(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn prepare_skips_install_check_in_dry_run(#[future] harness: Harness) {
    let harness = harness.await;
    let mut executor = MockExecutor::new();
    executor.expect_check_installed().never();
    let config = OrchestratorConfig {
        dry_run: true,
        ..live_config()
    };

    harness
        .orchestrator(executor, config)
        .prepare()
        .await
        .expect("prepare succeeds");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn prepare_fails_when_tool_is_missing(#[future] harness: Harness) {
    let harness = harness.await;
    let mut executor = MockExecutor::new();
    executor.expect_check_installed().returning(|| {
        Err(ExecutorError::NotInstalled {
            binary: "claude".to_owned(),
            reason: "not found".to_owned(),
        })
    });

    let result = harness
        .orchestrator(executor, live_config())
        .prepare()
        .await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Executor(ExecutorError::NotInstalled { .. }))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn watch_checks_cancellation_between_tasks(#[future] harness: Harness) {
    let harness = harness.await;
    harness.add(ready("a", "first"));
    harness.add(ready("b", "second"));
    let cancel = CancellationToken::new();
    let cancel_from_run = cancel.clone();
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .times(1)
        .returning(move |task, _| {
            cancel_from_run.cancel();
            Ok(finished(task, true))
        });
    let orchestrator = harness.orchestrator(executor, live_config());

    let summary = orchestrator.watch(&cancel).await;

    assert_eq!(summary.polls, 1);
    assert_eq!(summary.executed, 1);
    let stored = harness.store.get_task(&task_id("b")).await.expect("task");
    assert_eq!(stored.status(), &TaskStatus::Ready);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn watch_survives_failed_polls(#[future] harness: Harness) {
    let harness = harness.await;
    harness.store.fail_reads(true).expect("inject");
    let orchestrator = harness.orchestrator(MockExecutor::new(), live_config());
    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stopper.cancel();
    });

    let summary = orchestrator.watch(&cancel).await;

    assert_eq!(summary.polls, 1);
    assert_eq!(summary.failed_polls, 1);
    assert_eq!(summary.executed, 0);
}
