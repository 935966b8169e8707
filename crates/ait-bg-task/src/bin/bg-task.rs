use ait_bg_task::cli::{execute, Cli, Command};
use ait_bg_task::logging::{init_cli_logging, init_runner_logging};
use ait_bg_task::store::TaskStore;
use ait_core::validate_task_id;
use anyhow::{Context, Result};
use clap::Parser;
use std::io;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let guard = match &cli.command {
        Some(Command::Run { root, task_id }) if validate_task_id(task_id).is_ok() => {
            let store = TaskStore::open(root.clone())
                .with_context(|| format!("failed to open task store at {}", root.display()))?;
            init_runner_logging(&store.runner_log_path(task_id))
        }
        _ => {
            init_cli_logging();
            None
        }
    };

    let code = execute(cli, &mut io::stdout().lock(), &mut io::stderr().lock());
    drop(guard);
    std::process::exit(code);
}
