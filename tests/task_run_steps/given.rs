//! Given steps for task run BDD scenarios.

use super::world::TaskRunWorld;
use rstest_bdd_macros::given;
use vibe_runner::task::domain::{Task, TaskId};

#[given(r#"a ready task "{id}" with prompt "{prompt}""#)]
fn ready_task_with_prompt(
    world: &mut TaskRunWorld,
    id: String,
    prompt: String,
) -> Result<(), eyre::Report> {
    world
        .store
        .insert(Task::new(TaskId::new(id)?, "Scenario task").with_prompt(prompt))?;
    Ok(())
}

#[given(r#"a ready task "{id}" without a prompt"#)]
fn ready_task_without_prompt(world: &mut TaskRunWorld, id: String) -> Result<(), eyre::Report> {
    world
        .store
        .insert(Task::new(TaskId::new(id)?, "Scenario task"))?;
    Ok(())
}

#[given("the runner is in dry-run mode")]
fn dry_run_mode(world: &mut TaskRunWorld) {
    world.dry_run = true;
}

#[given(r#"the tool fails with "{message}""#)]
fn tool_fails(world: &mut TaskRunWorld, message: String) -> Result<(), eyre::Report> {
    world.install_tool(&format!("echo '{message}' >&2\nexit 1"))
}

#[given(r#"the tool succeeds with session "{session}""#)]
fn tool_succeeds(world: &mut TaskRunWorld, session: String) -> Result<(), eyre::Report> {
    world.install_tool(&format!(
        "echo done\necho '{{\"type\":\"result\",\"session_id\":\"{session}\"}}'"
    ))
}
