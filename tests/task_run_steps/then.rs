//! Then steps for task run BDD scenarios.

use super::world::{TaskRunWorld, run_async};
use rstest_bdd_macros::then;
use vibe_runner::task::{
    domain::{Execution, StatusNames, Task, TaskId},
    ports::TaskStore,
    services::{BatchReport, TaskOutcome, TaskReport},
};

fn report(world: &TaskRunWorld) -> Result<&BatchReport, eyre::Report> {
    world
        .last_report
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing run report in scenario world"))
}

fn task_report<'a>(world: &'a TaskRunWorld, id: &str) -> Result<&'a TaskReport, eyre::Report> {
    report(world)?
        .tasks
        .iter()
        .find(|task_report| task_report.task.id().as_str() == id)
        .ok_or_else(|| eyre::eyre!("no report for task {id}"))
}

fn execution<'a>(world: &'a TaskRunWorld, id: &str) -> Result<&'a Execution, eyre::Report> {
    task_report(world, id)?
        .execution()
        .ok_or_else(|| eyre::eyre!("task {id} was not executed"))
}

fn stored_task(world: &TaskRunWorld, id: String) -> Result<Task, eyre::Report> {
    let task_id = TaskId::new(id)?;
    Ok(run_async(world.store.get_task(&task_id))?)
}

#[then("{count:usize} tasks are executed")]
fn tasks_are_executed(world: &TaskRunWorld, count: usize) -> Result<(), eyre::Report> {
    let executed = report(world)?.executed_count();
    eyre::ensure!(executed == count, "expected {count} executions, found {executed}");
    Ok(())
}

#[then(r#"the output of task "{id}" starts with "{prefix}""#)]
fn output_starts_with(world: &TaskRunWorld, id: String, prefix: String) -> Result<(), eyre::Report> {
    let output = &execution(world, &id)?.output;
    eyre::ensure!(output.starts_with(&prefix), "unexpected output: {output}");
    Ok(())
}

#[then("the board has no writes")]
fn board_has_no_writes(world: &TaskRunWorld) -> Result<(), eyre::Report> {
    let writes = world.store.writes()?;
    eyre::ensure!(writes.is_empty(), "expected no writes, found {writes:?}");
    Ok(())
}

#[then(r#"task "{id}" is skipped"#)]
fn task_is_skipped(world: &TaskRunWorld, id: String) -> Result<(), eyre::Report> {
    let outcome = &task_report(world, &id)?.outcome;
    eyre::ensure!(
        matches!(outcome, TaskOutcome::Skipped),
        "expected a skip, got {outcome:?}"
    );
    Ok(())
}

#[then(r#"task "{id}" has status "{status}""#)]
fn task_has_status(world: &TaskRunWorld, id: String, status: String) -> Result<(), eyre::Report> {
    let task = stored_task(world, id)?;
    let names = StatusNames::default();
    let actual = names.name_of(task.status());
    eyre::ensure!(actual == status, "expected status {status}, found {actual}");
    Ok(())
}

#[then(r#"the result of task "{id}" ends with "{suffix}""#)]
fn result_ends_with(world: &TaskRunWorld, id: String, suffix: String) -> Result<(), eyre::Report> {
    let task = stored_task(world, id)?;
    eyre::ensure!(
        task.result().ends_with(&suffix),
        "unexpected result: {}",
        task.result()
    );
    Ok(())
}

#[then(r#"task "{id}" has session "{session}""#)]
fn task_has_session(world: &TaskRunWorld, id: String, session: String) -> Result<(), eyre::Report> {
    let task = stored_task(world, id)?;
    eyre::ensure!(
        task.session_id() == Some(session.as_str()),
        "unexpected session: {:?}",
        task.session_id()
    );
    Ok(())
}
