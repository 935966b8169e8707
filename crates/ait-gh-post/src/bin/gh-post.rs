use ait_gh_post::{identity_from_env, rewrite_gh_args, GitRepo, RepoInfo};
use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::process::Command;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const GH_BIN_ENV: &str = "GH_POST_GH_BIN";

#[derive(Parser, Debug)]
#[command(name = "gh-post")]
#[command(about = "Run gh with identity-tagged titles and bodies", long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    /// Arguments forwarded to gh
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn init_logging() {
    let level = std::env::var("GH_POST_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
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

    let repo = GitRepo::default();
    let identity = identity_from_env(&repo);
    let commit = repo.short_commit();
    debug!(?identity, ?commit, "resolved identity");
    let args = rewrite_gh_args(&cli.args, &identity, commit.as_deref(), chrono::Utc::now());

    let gh = std::env::var(GH_BIN_ENV).unwrap_or_else(|_| "gh".to_string());
    info!(program = %gh, "forwarding to gh");
    let status = Command::new(&gh)
        .args(&args)
        .status()
        .with_context(|| format!("failed to run {gh}"))?;
    std::process::exit(status.code().unwrap_or(1));
}
