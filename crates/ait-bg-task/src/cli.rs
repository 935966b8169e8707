use crate::error::TaskError;
use crate::launcher::{StartRequest, RUNNER_SUBCOMMAND};
use crate::runner::run_supervised;
use crate::store::TaskStore;
use crate::table::render_task_table;
use ait_core::TaskStatus;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "bg-task")]
#[command(about = "Run and track background tasks outside the agent's turn", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum Command {
    /// Start a command in the background
    Start(StartArgs),
    /// Show a task's metadata as JSON
    Status { task_id: String },
    /// List running tasks (all tasks with --all)
    List {
        #[arg(long)]
        all: bool,
    },
    /// Print the tail of a task's output
    Tail {
        task_id: String,
        #[arg(short = 'n', long)]
        lines: Option<usize>,
        #[arg(short, long)]
        follow: bool,
    },
    /// Terminate a running task
    Kill { task_id: String },
    /// Block until a task finishes
    Wait {
        task_id: String,
        /// Seconds to wait before giving up
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Remove old task directories
    Cleanup {
        #[arg(long)]
        days: Option<u64>,
        /// Kill and remove running tasks too
        #[arg(long)]
        force: bool,
    },
    #[command(name = RUNNER_SUBCOMMAND, hide = true)]
    Run {
        #[arg(long)]
        root: PathBuf,
        task_id: String,
    },
}

#[derive(Args, Debug)]
pub struct StartArgs {
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub issue: Option<u64>,
    /// Seconds before the command is terminated; 0 disables the limit
    #[arg(long)]
    pub timeout: Option<u64>,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Runs a parsed command line against the discovered task store and returns the exit code.
pub fn execute(cli: Cli, out: &mut impl Write, err: &mut impl Write) -> i32 {
    let Some(command) = cli.command else {
        let _ = writeln!(out, "{}", Cli::command().render_help());
        return 1;
    };

    let store = match &command {
        Command::Run { root, .. } => TaskStore::open(root.clone()),
        _ => TaskStore::discover(),
    };
    match store {
        Ok(store) => dispatch(&store, command, out, err),
        Err(e) => report(err, &e),
    }
}

pub fn dispatch(
    store: &TaskStore,
    command: Command,
    out: &mut impl Write,
    err: &mut impl Write,
) -> i32 {
    let outcome = match command {
        Command::Start(args) => handle_start(store, args, out),
        Command::Status { task_id } => handle_status(store, &task_id, out),
        Command::List { all } => handle_list(store, all, out),
        Command::Tail {
            task_id,
            lines,
            follow,
        } => handle_tail(store, &task_id, lines, follow, out),
        Command::Kill { task_id } => handle_kill(store, &task_id, out),
        Command::Wait { task_id, timeout } => handle_wait(store, &task_id, timeout, out),
        Command::Cleanup { days, force } => handle_cleanup(store, days, force, out),
        Command::Run { task_id, .. } => handle_run(store, &task_id),
    };
    match outcome {
        Ok(code) => code,
        Err(e) => report(err, &e),
    }
}

fn report(err: &mut impl Write, e: &TaskError) -> i32 {
    let _ = writeln!(err, "Error: {e}");
    1
}

fn handle_start(
    store: &TaskStore,
    args: StartArgs,
    out: &mut impl Write,
) -> Result<i32, TaskError> {
    let mut argv = args.command;
    if argv.first().map(String::as_str) == Some("--") {
        argv.remove(0);
    }
    let request = StartRequest {
        description: args.description,
        issue: args.issue,
        timeout: args.timeout,
        ..StartRequest::new(args.id, argv)
    };
    let meta = store.start_task(request)?;
    let pid = meta
        .pid
        .map(|pid| pid.to_string())
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(out, "Started task {}", meta.task_id);
    let _ = writeln!(out, "PID: {pid}");
    let _ = writeln!(out, "Log: {}", store.log_path(&meta.task_id).display());
    Ok(0)
}

fn handle_status(store: &TaskStore, task_id: &str, out: &mut impl Write) -> Result<i32, TaskError> {
    let meta = store.update_task_status(task_id)?;
    let path = store.meta_path(task_id);
    let rendered = serde_json::to_string_pretty(&meta).map_err(TaskError::json(&path))?;
    let _ = writeln!(out, "{rendered}");
    Ok(0)
}

fn handle_list(store: &TaskStore, all: bool, out: &mut impl Write) -> Result<i32, TaskError> {
    let tasks = store.list_tasks(all)?;
    let _ = writeln!(out, "{}", render_task_table(&tasks, chrono::Utc::now()));
    Ok(0)
}

fn handle_tail(
    store: &TaskStore,
    task_id: &str,
    lines: Option<usize>,
    follow: bool,
    out: &mut impl Write,
) -> Result<i32, TaskError> {
    let lines = lines.unwrap_or(store.config().tail_lines);
    if follow {
        store.tail_follow(task_id, lines, out)?;
    } else {
        let tail = store.tail_output(task_id, lines)?;
        let _ = writeln!(out, "{tail}");
    }
    Ok(0)
}

fn handle_kill(store: &TaskStore, task_id: &str, out: &mut impl Write) -> Result<i32, TaskError> {
    let before = store.update_task_status(task_id)?;
    if before.status != TaskStatus::Running {
        let _ = writeln!(out, "Task {task_id} already {}", before.status);
        return Ok(0);
    }
    let meta = store.kill_task(task_id)?;
    if meta.status == TaskStatus::Killed {
        let _ = writeln!(out, "Task {task_id} killed");
    } else {
        let _ = writeln!(out, "Task {task_id} already {}", meta.status);
    }
    Ok(0)
}

fn handle_wait(
    store: &TaskStore,
    task_id: &str,
    timeout: Option<u64>,
    out: &mut impl Write,
) -> Result<i32, TaskError> {
    let timeout = Duration::from_secs(timeout.unwrap_or(store.config().default_timeout_secs));
    let meta = store.wait_for_task(task_id, timeout, store.config().poll_interval())?;
    let _ = writeln!(out, "Task {task_id} {}", meta.status);
    if let Some(code) = meta.exit_code {
        let _ = writeln!(out, "Exit code: {code}");
    }
    Ok(if meta.status == TaskStatus::Completed { 0 } else { 1 })
}

fn handle_cleanup(
    store: &TaskStore,
    days: Option<u64>,
    force: bool,
    out: &mut impl Write,
) -> Result<i32, TaskError> {
    let days = days.unwrap_or(store.config().cleanup_days);
    let removed = store.cleanup_tasks(days, force)?;
    if removed.is_empty() {
        let _ = writeln!(out, "No tasks to clean up");
    } else {
        let _ = writeln!(out, "Removed {} task(s): {}", removed.len(), removed.join(", "));
    }
    Ok(0)
}

fn handle_run(store: &TaskStore, task_id: &str) -> Result<i32, TaskError> {
    match run_supervised(store, task_id) {
        Ok(_) => Ok(0),
        Err(e) => {
            error!(task_id, "runner failed: {e}");
            Err(e)
        }
    }
}
