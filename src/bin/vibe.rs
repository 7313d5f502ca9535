//! Command-line entry point for vibe-runner.
//!
//! Usage:
//!
//! ```text
//! vibe run [TASK_ID] [--all] [--dry-run] [--timeout SECS] [--resume SESSION] [--no-comment]
//! vibe watch [--interval SECS] [--dry-run]
//! vibe task list [--status NAME]
//! vibe task show ID
//! vibe status list
//! vibe status fields
//! vibe project list [OWNER]
//! vibe project select OWNER NUMBER
//! vibe project show
//! ```
#![expect(
    clippy::print_stdout,
    clippy::print_stderr,
    reason = "the binary reports results on stdout and fatal errors on stderr"
)]

use clap::{Args, Parser, Subcommand};
use mockable::DefaultClock;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use vibe_runner::config::{Config, ConfigError};
use vibe_runner::task::{
    adapters::{
        claude::ClaudeExecutor,
        github::{GitHubClient, GitHubError, GitHubTaskStore, ProjectLocator},
        notify::select_notifier,
    },
    domain::{BoardSchema, Task, TaskDomainError, TaskFilter, TaskId},
    ports::{Notifier, TaskStore, TaskStoreError},
    services::{
        BatchReport, Orchestrator, OrchestratorConfig, OrchestratorError, RunTarget, TaskOutcome,
        TaskReport,
    },
};

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

type BoardOrchestrator =
    Orchestrator<GitHubTaskStore, ClaudeExecutor<DefaultClock>, dyn Notifier, DefaultClock>;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    GitHub(#[from] GitHubError),
    #[error(transparent)]
    Store(#[from] TaskStoreError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    #[error("failed to start logging: {0}")]
    Telemetry(#[source] BoxError),
    #[error("owner is required (pass OWNER or run `vibe project select` first)")]
    OwnerRequired,
}

#[derive(Debug, Parser)]
#[command(name = "vibe", version, about = "Run GitHub Project tasks through Claude Code")]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute ready tasks once.
    Run(RunArgs),
    /// Poll the board and execute ready tasks until interrupted.
    Watch(WatchArgs),
    /// Inspect tasks on the board.
    #[command(subcommand)]
    Task(TaskCommand),
    /// Inspect the board's fields.
    #[command(subcommand)]
    Status(StatusCommand),
    /// Find and select the project board.
    #[command(subcommand)]
    Project(ProjectCommand),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Task to execute; defaults to the first ready task.
    task_id: Option<String>,
    /// Execute every ready task.
    #[arg(long, conflicts_with = "task_id")]
    all: bool,
    /// Describe what would run without executing or writing.
    #[arg(long)]
    dry_run: bool,
    /// Per-task timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
    /// Session to resume instead of the stored one.
    #[arg(long, value_name = "SESSION")]
    resume: Option<String>,
    /// Do not post a summary comment on linked issues.
    #[arg(long)]
    no_comment: bool,
}

#[derive(Debug, Args)]
struct WatchArgs {
    /// Seconds between polls.
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,
    /// Describe what would run without executing or writing.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Subcommand)]
enum TaskCommand {
    /// List tasks, optionally restricted to one status option.
    List {
        /// Board status option name.
        #[arg(long, value_name = "NAME")]
        status: Option<String>,
    },
    /// Show one task.
    Show {
        /// Board item identifier.
        id: String,
    },
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum StatusCommand {
    /// List the status options of the board.
    List,
    /// List the board fields the runner maps.
    Fields,
}

#[derive(Debug, Subcommand)]
enum ProjectCommand {
    /// List the boards of a user or organization.
    List {
        /// Owning login; defaults to the configured owner.
        owner: Option<String>,
    },
    /// Save a board as the selected project in the global file.
    Select {
        /// User or organization login.
        owner: String,
        /// Project number.
        number: u64,
    },
    /// Show the selected board.
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    vibe_runner::telemetry::init(cli.verbose).map_err(|err| CliError::Telemetry(Box::new(err)))?;
    let mut config = Config::load()?;
    debug!(?config, "configuration loaded");

    match cli.command {
        Command::Run(args) => run_tasks(&mut config, args).await,
        Command::Watch(args) => watch(&mut config, args).await,
        Command::Task(command) => inspect_tasks(&config, command).await,
        Command::Status(command) => inspect_board(&config, command).await,
        Command::Project(command) => manage_project(&config, command).await,
    }
}

fn github_client(config: &Config) -> Result<GitHubClient, CliError> {
    if config.github_token.trim().is_empty() {
        return Err(ConfigError::MissingToken.into());
    }
    Ok(GitHubClient::new(
        config.github_token.clone(),
        config.graphql_url.clone(),
    )?)
}

fn board_store(config: &Config) -> Result<GitHubTaskStore, CliError> {
    config.validate()?;
    let client = github_client(config)?;
    Ok(GitHubTaskStore::new(
        client,
        config.project(),
        config.status_names.clone(),
    ))
}

fn orchestrator(
    config: &Config,
    orchestrator_config: OrchestratorConfig,
) -> Result<BoardOrchestrator, CliError> {
    let store = board_store(config)?;
    let clock = Arc::new(DefaultClock);
    let executor = ClaudeExecutor::new(config.claude_path.clone(), Arc::clone(&clock))
        .with_extra_args(config.executor.extra_args.clone());
    let notifier = select_notifier(config.notifications && !orchestrator_config.dry_run);
    Ok(Orchestrator::new(
        Arc::new(store),
        Arc::new(executor),
        notifier,
        clock,
        orchestrator_config,
    ))
}

fn base_orchestrator_config(config: &Config, dry_run: bool) -> Result<OrchestratorConfig, CliError> {
    let work_dir = std::env::current_dir().map_err(CliError::CurrentDir)?;
    Ok(OrchestratorConfig {
        timeout: config.timeout(),
        dry_run,
        session_id: None,
        post_comments: config.post_comments,
        default_work_dir: work_dir,
        watch_interval: config.watch_interval(),
    })
}

async fn run_tasks(config: &mut Config, args: RunArgs) -> Result<ExitCode, CliError> {
    if let Some(secs) = args.timeout {
        config.executor.timeout_secs = secs;
    }
    let mut settings = base_orchestrator_config(config, args.dry_run)?;
    settings.session_id = args.resume;
    settings.post_comments = config.post_comments && !args.no_comment;

    let target = match (args.task_id, args.all) {
        (Some(id), _) => RunTarget::Task(TaskId::new(id)?),
        (None, true) => RunTarget::AllReady,
        (None, false) => RunTarget::FirstReady,
    };

    let orchestrator = orchestrator(config, settings)?;
    orchestrator.prepare().await?;
    let report = orchestrator.run(target).await?;
    print_batch(&report);
    if report.failed_count() > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn watch(config: &mut Config, args: WatchArgs) -> Result<ExitCode, CliError> {
    if let Some(secs) = args.interval {
        config.watch.interval_secs = secs;
    }
    let settings = base_orchestrator_config(config, args.dry_run)?;
    let orchestrator = orchestrator(config, settings)?;
    orchestrator.prepare().await?;

    println!(
        "Watching for ready tasks every {}s (Ctrl-C to stop)",
        config.watch_interval().as_secs()
    );
    let summary = orchestrator.watch_until_interrupted().await;
    println!(
        "Stopped after {} polls: {} executed, {} failed, {} failed polls",
        summary.polls, summary.executed, summary.failed, summary.failed_polls
    );
    Ok(ExitCode::SUCCESS)
}

async fn inspect_tasks(config: &Config, command: TaskCommand) -> Result<ExitCode, CliError> {
    let store = board_store(config)?;
    store.initialize().await?;
    match command {
        TaskCommand::List { status } => {
            let filter = TaskFilter {
                status: status.map(|name| config.status_names.parse(&name)),
                limit: None,
            };
            let tasks = store.get_tasks(&filter).await?;
            if tasks.is_empty() {
                println!("No tasks found");
            }
            for task in &tasks {
                println!(
                    "{}\t{}\t{}",
                    task.id(),
                    config.status_names.name_of(task.status()),
                    task.title()
                );
            }
        }
        TaskCommand::Show { id } => {
            let task = store.get_task(&TaskId::new(id)?).await?;
            print_task(config, &task);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn inspect_board(config: &Config, command: StatusCommand) -> Result<ExitCode, CliError> {
    let store = board_store(config)?;
    store.initialize().await?;
    let schema = store.schema()?;
    match command {
        StatusCommand::List => {
            for option in schema.status_options() {
                println!("{}", option.name);
            }
        }
        StatusCommand::Fields => print_fields(&schema),
    }
    Ok(ExitCode::SUCCESS)
}

async fn manage_project(config: &Config, command: ProjectCommand) -> Result<ExitCode, CliError> {
    let client = github_client(config)?;
    match command {
        ProjectCommand::List { owner } => {
            let owner = listing_owner(owner, config)?;
            let projects = client.list_projects(&owner).await?;
            if projects.is_empty() {
                println!("No projects found for {owner}");
                return Ok(ExitCode::SUCCESS);
            }
            println!("Projects for {owner}:\n");
            for project in &projects {
                println!("  #{:<4} {}", project.number, project.title);
                println!("        {}", project.url);
            }
            println!("\nSelect one with: vibe project select {owner} <number>");
        }
        ProjectCommand::Select { owner, number } => {
            let locator = ProjectLocator { owner, number };
            let project = client.find_project(&locator).await?;
            Config::select_project(&locator)?;
            println!("✓ Selected project: {} (#{})", project.title, project.number);
            println!("  URL: {}", project.url);
        }
        ProjectCommand::Show => {
            if !config.has_project() {
                return Err(ConfigError::ProjectNotSelected.into());
            }
            let locator = config.project();
            let project = client.find_project(&locator).await?;
            println!("Title:   {}", project.title);
            println!("Number:  #{}", project.number);
            println!("Owner:   {}", locator.owner);
            println!("URL:     {}", project.url);
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Owner for `project list`: the argument, else the configured owner.
fn listing_owner(owner: Option<String>, config: &Config) -> Result<String, CliError> {
    owner
        .filter(|login| !login.trim().is_empty())
        .or_else(|| {
            (!config.project_owner.is_empty()).then(|| config.project_owner.clone())
        })
        .ok_or(CliError::OwnerRequired)
}

fn print_fields(schema: &BoardSchema) {
    for field in schema.fields() {
        let mapped = schema
            .logical_for(&field.name)
            .map_or("-", |logical| logical.board_name());
        println!("{}\t{}\t{}", field.name, field.kind.as_str(), mapped);
    }
}

fn print_task(config: &Config, task: &Task) {
    println!("ID:        {}", task.id());
    println!("Title:     {}", task.title());
    println!("Status:    {}", config.status_names.name_of(task.status()));
    if let Some(url) = task.issue_url() {
        println!("Issue:     {url}");
    }
    if !task.work_dir().as_os_str().is_empty() {
        println!("WorkDir:   {}", task.work_dir().display());
    }
    if let Some(session) = task.session_id() {
        println!("Session:   {session}");
    }
    if let Some(date) = task.executed_at() {
        println!("Executed:  {date}");
    }
    if !task.prompt().is_empty() {
        println!("\n{}", task.prompt());
    }
    if !task.result().is_empty() {
        println!("\nResult:\n{}", task.result());
    }
}

fn print_batch(report: &BatchReport) {
    if report.is_empty() {
        println!("No ready tasks found");
        return;
    }
    for task_report in &report.tasks {
        print_task_report(task_report);
    }
    println!(
        "\n{} executed, {} succeeded, {} failed",
        report.executed_count(),
        report.succeeded_count(),
        report.failed_count()
    );
}

fn print_task_report(report: &TaskReport) {
    let id = report.task.id();
    let title = report.task.title();
    match &report.outcome {
        TaskOutcome::Skipped => println!("- {id} {title}: skipped (not executable)"),
        TaskOutcome::PromptUnavailable(reason) => {
            println!("- {id} {title}: prompt unavailable ({reason})");
        }
        TaskOutcome::ExecutorRejected(err) => println!("- {id} {title}: not run ({err})"),
        TaskOutcome::Executed(execution) => {
            let verdict = if execution.success { "succeeded" } else { "failed" };
            println!(
                "- {id} {title}: {verdict} in {:.1}s",
                execution.duration().as_secs_f64()
            );
            println!("{}", execution.summary());
        }
    }
    for step in report.writes.failed_steps() {
        println!("  warning: {step} failed");
    }
}
