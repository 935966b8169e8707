use ait_health::cli::{run, Cli};
use ait_health::GitIterationSource;
use anyhow::Result;
use clap::Parser;
use std::io;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let level = std::env::var("HEALTH_CHECK_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
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
    let source = GitIterationSource::new(ait_core::git::toplevel());
    let code = run(&cli, &source, &mut io::stdout().lock())?;
    std::process::exit(code);
}
