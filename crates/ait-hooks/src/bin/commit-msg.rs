use ait_core::git::git_output;
use ait_hooks::commit_msg::{ITERATION_ENV, ROLE_ENV};
use ait_hooks::{
    process_commit_message, resolve_iteration, role_letter, CommitContext, CommitOutcome,
    GhIssues,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const GH_BIN_ENV: &str = "COMMIT_MSG_GH_BIN";
const HISTORY_DEPTH: &str = "1000";

#[derive(Parser, Debug)]
#[command(name = "commit-msg")]
#[command(about = "Tag an agent commit message with its role and iteration", long_about = None)]
struct Cli {
    /// Commit message file passed in by git
    message_file: PathBuf,
}

fn init_logging() {
    let level = std::env::var("COMMIT_MSG_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let path = &cli.message_file;
    let message =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let role = std::env::var(ROLE_ENV).unwrap_or_default();
    let iteration = match role_letter(&role) {
        Some(letter) => {
            let history = git_output(&["log", "--format=%s", "-n", HISTORY_DEPTH], None);
            let env_iteration = std::env::var(ITERATION_ENV).ok();
            resolve_iteration(
                env_iteration.as_deref(),
                letter,
                history.as_deref().unwrap_or_default(),
            )
        }
        None => 0,
    };
    let ctx = CommitContext {
        role,
        iteration,
        timestamp: chrono::Utc::now(),
    };
    let gh = GhIssues::new(std::env::var(GH_BIN_ENV).unwrap_or_else(|_| "gh".to_string()));

    match process_commit_message(&message, &ctx, &gh) {
        CommitOutcome::Skipped(reason) => debug!(?reason, "commit message left unchanged"),
        CommitOutcome::Rewritten { message, warnings } => {
            let mut stderr = io::stderr().lock();
            for warning in &warnings {
                let _ = writeln!(stderr, "commit-msg: warning: {warning}");
            }
            fs::write(path, message)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(iteration = ctx.iteration, "tagged commit message");
        }
    }
    Ok(())
}
