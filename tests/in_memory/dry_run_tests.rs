//! In-memory integration tests for dry runs and start-up checks.

use super::helpers::{ISSUE_URL, THREAD_PROMPT, board, config_in, orchestrator, task_id};
use rstest::rstest;
use std::sync::Arc;
use vibe_runner::task::{
    adapters::memory::InMemoryTaskStore,
    ports::{ExecutorError, TaskStore},
    services::{OrchestratorConfig, OrchestratorError, RunTarget, TaskOutcome},
};

const MISSING_BINARY: &str = "/nonexistent/claude";

fn dry_run_config() -> OrchestratorConfig {
    OrchestratorConfig {
        dry_run: true,
        ..config_in(&std::env::temp_dir())
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dry_run_describes_every_ready_task_without_writing(
    board: Result<Arc<InMemoryTaskStore>, eyre::Report>,
) -> Result<(), eyre::Report> {
    let store = board?;
    let (orchestrator, notifier) = orchestrator(&store, MISSING_BINARY, dry_run_config());

    orchestrator.prepare().await?;
    let report = orchestrator.run(RunTarget::AllReady).await?;

    eyre::ensure!(report.executed_count() == 2, "expected two dry runs");
    eyre::ensure!(report.failed_count() == 0, "dry runs never fail");
    for execution in report.executions() {
        eyre::ensure!(
            execution.output.starts_with("[DRY RUN] Would execute:"),
            "unexpected dry-run output: {}",
            execution.output
        );
    }
    eyre::ensure!(store.writes()?.is_empty(), "dry run wrote to the board");
    eyre::ensure!(
        store.thread(ISSUE_URL)? == vec![THREAD_PROMPT],
        "dry run commented on the thread"
    );
    eyre::ensure!(notifier.sent()?.is_empty(), "dry run sent notifications");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dry_run_loads_the_prompt_from_the_thread(
    board: Result<Arc<InMemoryTaskStore>, eyre::Report>,
) -> Result<(), eyre::Report> {
    let store = board?;
    let (orchestrator, _notifier) = orchestrator(&store, MISSING_BINARY, dry_run_config());
    orchestrator.prepare().await?;

    let report = orchestrator.run(RunTarget::Task(task_id("linked")?)).await?;

    let task_report = report
        .tasks
        .first()
        .ok_or_else(|| eyre::eyre!("expected one task report"))?;
    eyre::ensure!(
        task_report.task.prompt() == THREAD_PROMPT,
        "prompt was {:?}",
        task_report.task.prompt()
    );
    let execution = task_report
        .execution()
        .ok_or_else(|| eyre::eyre!("expected an execution"))?;
    eyre::ensure!(
        execution.output.contains(THREAD_PROMPT),
        "dry-run output should quote the prompt"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn finished_task_is_skipped(
    board: Result<Arc<InMemoryTaskStore>, eyre::Report>,
) -> Result<(), eyre::Report> {
    let store = board?;
    let (orchestrator, _notifier) = orchestrator(&store, MISSING_BINARY, dry_run_config());
    orchestrator.prepare().await?;

    let report = orchestrator
        .run(RunTarget::Task(task_id("finished")?))
        .await?;

    let outcome = report.tasks.first().map(|task_report| &task_report.outcome);
    eyre::ensure!(
        matches!(outcome, Some(TaskOutcome::Skipped)),
        "expected a skip, got {outcome:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_tool_stops_a_real_run_before_the_board_is_read(
    board: Result<Arc<InMemoryTaskStore>, eyre::Report>,
) -> Result<(), eyre::Report> {
    let store = board?;
    let (orchestrator, _notifier) =
        orchestrator(&store, MISSING_BINARY, config_in(&std::env::temp_dir()));

    let result = orchestrator.prepare().await;

    eyre::ensure!(
        matches!(
            result,
            Err(OrchestratorError::Executor(ExecutorError::NotInstalled { .. }))
        ),
        "expected a missing-tool error, got {result:?}"
    );
    eyre::ensure!(
        store.schema().is_err(),
        "board should stay uninitialized"
    );
    Ok(())
}
