//! In-memory integration tests running a scripted stand-in for `claude`.

use super::helpers::{ISSUE_URL, THREAD_PROMPT, board, config_in, fake_claude, orchestrator, task_id};
use rstest::rstest;
use std::sync::Arc;
use vibe_runner::task::{
    adapters::memory::InMemoryTaskStore,
    domain::{COMMENT_HEADER, LogicalField, TaskStatus},
    ports::{Notification, TaskStore},
    services::{RunTarget, WriteStep},
};

const SUCCESS_SCRIPT: &str = "echo \"ran: $*\"\necho '{\"type\":\"result\",\"session_id\":\"sess-7\"}'";
const FAILURE_SCRIPT: &str = "echo partial\necho boom >&2\nexit 3";

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn successful_run_writes_results_back(
    board: Result<Arc<InMemoryTaskStore>, eyre::Report>,
) -> Result<(), eyre::Report> {
    let store = board?;
    let dir = tempfile::tempdir()?;
    let binary = fake_claude(dir.path(), SUCCESS_SCRIPT)?;
    let (orchestrator, notifier) = orchestrator(&store, &binary, config_in(dir.path()));
    orchestrator.prepare().await?;

    let report = orchestrator.run(RunTarget::AllReady).await?;

    eyre::ensure!(report.succeeded_count() == 2, "both tasks should succeed");
    for task_report in &report.tasks {
        eyre::ensure!(
            task_report.writes.all_succeeded(),
            "writes failed for {}",
            task_report.task.id()
        );
    }

    let linked = store.get_task(&task_id("linked")?).await?;
    eyre::ensure!(linked.status() == &TaskStatus::InReview, "linked not in review");
    eyre::ensure!(linked.session_id() == Some("sess-7"), "session not stored");
    eyre::ensure!(
        linked.result().contains(&format!("ran: --print {THREAD_PROMPT}")),
        "result was {:?}",
        linked.result()
    );

    let thread = store.thread(ISSUE_URL)?;
    let comment = thread
        .last()
        .ok_or_else(|| eyre::eyre!("missing comment"))?;
    eyre::ensure!(comment.starts_with(COMMENT_HEADER), "comment lacks header");
    eyre::ensure!(comment.contains("✅ Completed"), "comment lacks status");

    let sent = notifier.sent()?;
    eyre::ensure!(sent.len() == 2, "expected two notifications");
    eyre::ensure!(
        sent.iter()
            .all(|notification| matches!(notification, Notification::Success { .. })),
        "expected success notifications"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_run_lands_in_review_with_the_error(
    board: Result<Arc<InMemoryTaskStore>, eyre::Report>,
) -> Result<(), eyre::Report> {
    let store = board?;
    let dir = tempfile::tempdir()?;
    let binary = fake_claude(dir.path(), FAILURE_SCRIPT)?;
    let (orchestrator, notifier) = orchestrator(&store, &binary, config_in(dir.path()));
    store.initialize().await?;

    let report = orchestrator
        .run(RunTarget::Task(task_id("inline")?))
        .await?;

    eyre::ensure!(report.failed_count() == 1, "expected one failure");
    let inline = store.get_task(&task_id("inline")?).await?;
    eyre::ensure!(inline.status() == &TaskStatus::InReview, "inline not in review");
    eyre::ensure!(
        inline.result().starts_with("Error: ") && inline.result().ends_with(": boom"),
        "result was {:?}",
        inline.result()
    );
    eyre::ensure!(inline.session_id().is_none(), "no session expected");
    eyre::ensure!(
        matches!(notifier.sent()?.as_slice(), [Notification::Failure { .. }]),
        "expected one failure notification"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn write_failures_do_not_stop_the_batch(
    board: Result<Arc<InMemoryTaskStore>, eyre::Report>,
) -> Result<(), eyre::Report> {
    let store = board?;
    store.fail_field(LogicalField::Status)?;
    let dir = tempfile::tempdir()?;
    let binary = fake_claude(dir.path(), SUCCESS_SCRIPT)?;
    let (orchestrator, _notifier) = orchestrator(&store, &binary, config_in(dir.path()));
    orchestrator.prepare().await?;

    let report = orchestrator.run(RunTarget::AllReady).await?;

    eyre::ensure!(report.executed_count() == 2, "both tasks should run");
    for task_report in &report.tasks {
        eyre::ensure!(
            task_report
                .writes
                .failed_steps()
                .starts_with(&[WriteStep::MarkInProgress, WriteStep::UpdateTask]),
            "unexpected failed steps for {}",
            task_report.task.id()
        );
    }
    let thread = store.thread(ISSUE_URL)?;
    eyre::ensure!(thread.len() == 2, "comment should still be posted");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn executed_tasks_are_not_picked_up_again(
    board: Result<Arc<InMemoryTaskStore>, eyre::Report>,
) -> Result<(), eyre::Report> {
    let store = board?;
    let dir = tempfile::tempdir()?;
    let binary = fake_claude(dir.path(), SUCCESS_SCRIPT)?;
    let (orchestrator, _notifier) = orchestrator(&store, &binary, config_in(dir.path()));
    orchestrator.prepare().await?;

    let first = orchestrator.run(RunTarget::FirstReady).await?;
    let second = orchestrator.run(RunTarget::FirstReady).await?;
    let third = orchestrator.run(RunTarget::FirstReady).await?;

    eyre::ensure!(first.executed_count() == 1, "first run executes one task");
    eyre::ensure!(second.executed_count() == 1, "second run executes the other");
    eyre::ensure!(third.is_empty(), "nothing should be left");
    Ok(())
}
