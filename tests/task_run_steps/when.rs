//! When steps for task run BDD scenarios.

use super::world::{TaskRunWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;
use vibe_runner::task::{domain::TaskId, ports::TaskStore, services::RunTarget};

fn run_target(world: &mut TaskRunWorld, target: RunTarget) -> Result<(), eyre::Report> {
    run_async(world.store.initialize()).wrap_err("initialize scenario board")?;
    let orchestrator = world.orchestrator();
    let report = run_async(orchestrator.run(target)).wrap_err("run scenario tasks")?;
    world.last_report = Some(report);
    Ok(())
}

#[when("the ready tasks are run")]
fn run_ready_tasks(world: &mut TaskRunWorld) -> Result<(), eyre::Report> {
    run_target(world, RunTarget::AllReady)
}

#[when(r#"task "{id}" is run"#)]
fn run_one_task(world: &mut TaskRunWorld, id: String) -> Result<(), eyre::Report> {
    run_target(world, RunTarget::Task(TaskId::new(id)?))
}
