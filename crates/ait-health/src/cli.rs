use crate::iterations::IterationSource;
use crate::report::{format_report, get_health_report, HealthStatus};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

pub const CRASH_LOG_RELATIVE: &str = "worker_logs/crashes.log";

#[derive(Parser, Debug)]
#[command(name = "health-check")]
#[command(
    about = "Summarize agent loop health from the crash log and worker commits",
    long_about = None
)]
pub struct Cli {
    /// Size of the reporting window in hours
    #[arg(long, default_value_t = 24)]
    pub hours: u64,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
    /// Print nothing when healthy
    #[arg(long)]
    pub quiet: bool,
    /// Crash log location (defaults to worker_logs/crashes.log under the git root)
    #[arg(long)]
    pub log: Option<PathBuf>,
}

impl Cli {
    pub fn crash_log(&self) -> PathBuf {
        self.log
            .clone()
            .unwrap_or_else(|| ait_core::git::toplevel().join(CRASH_LOG_RELATIVE))
    }
}

/// Prints the report and returns the process exit code (0 healthy, 1 warning, 2 critical).
pub fn run(cli: &Cli, iterations: &dyn IterationSource, out: &mut impl Write) -> Result<i32> {
    let crash_log = cli.crash_log();
    let now = chrono::Local::now().naive_local();
    let report = get_health_report(&crash_log, cli.hours, now, iterations)?;

    let quiet = cli.quiet && report.status == HealthStatus::Healthy;
    if !quiet {
        let rendered = if cli.json {
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        } else {
            format_report(&report, cli.hours)
        };
        writeln!(out, "{rendered}").context("failed to write report")?;
    }
    Ok(report.status.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crashes::append_crash;
    use ait_core::CrashEntry;
    use chrono::{Duration, NaiveDateTime};

    struct FixedIterations(usize);

    impl IterationSource for FixedIterations {
        fn count_iterations_since(&self, _since: NaiveDateTime) -> usize {
            self.0
        }
    }

    fn cli_for(log: PathBuf, extra: &[&str]) -> Cli {
        let log = log.display().to_string();
        let mut args = vec!["health-check", "--log", log.as_str()];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).expect("parse")
    }

    fn seed(crashes: u64) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("crashes.log");
        let recent = chrono::Local::now().naive_local() - Duration::hours(1);
        for iteration in 0..crashes {
            append_crash(&path, &CrashEntry::new(recent, iteration, "claude exited with code 1"))
                .expect("append");
        }
        (dir, path)
    }

    #[test]
    fn exit_codes_follow_status() {
        for (crashes, iterations, expected) in [(0, 10, 0), (3, 7, 1), (6, 4, 2)] {
            let (_dir, path) = seed(crashes);
            let mut out = Vec::new();
            let code = run(&cli_for(path, &[]), &FixedIterations(iterations), &mut out)
                .expect("run");
            assert_eq!(code, expected, "{crashes} crashes / {iterations} iterations");
            assert!(!out.is_empty());
        }
    }

    #[test]
    fn quiet_suppresses_only_healthy_output() {
        let (_dir, path) = seed(0);
        let mut out = Vec::new();
        let code = run(&cli_for(path, &["--quiet"]), &FixedIterations(5), &mut out).expect("run");
        assert_eq!(code, 0);
        assert!(out.is_empty());

        let (_dir, path) = seed(6);
        let mut out = Vec::new();
        let code = run(&cli_for(path, &["--quiet"]), &FixedIterations(1), &mut out).expect("run");
        assert_eq!(code, 2);
        assert!(String::from_utf8_lossy(&out).contains("[CRITICAL]"));
    }

    #[test]
    fn json_output_has_status_and_rate() {
        let (_dir, path) = seed(0);
        let mut out = Vec::new();
        run(&cli_for(path, &["--json", "--hours", "48"]), &FixedIterations(3), &mut out)
            .expect("run");
        let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(value["status"], "healthy");
        assert!(value.get("failure_rate").is_some());
    }
}
