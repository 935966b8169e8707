use crate::crashes::{analyze_crash_patterns, parse_crash_log};
use crate::error::HealthError;
use crate::iterations::IterationSource;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub const WARNING_THRESHOLD: f64 = 0.25;
pub const CRITICAL_THRESHOLD: f64 = 0.50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn from_failure_rate(rate: f64) -> Self {
        if rate >= CRITICAL_THRESHOLD {
            HealthStatus::Critical
        } else if rate >= WARNING_THRESHOLD {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }

    pub fn badge(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "[OK]",
            HealthStatus::Warning => "[WARN]",
            HealthStatus::Critical => "[CRITICAL]",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Warning => 1,
            HealthStatus::Critical => 2,
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "System operating normally.",
            HealthStatus::Warning => {
                "Monitor closely. Review recent crash messages for a recurring cause."
            }
            HealthStatus::Critical => {
                "ESCALATE: more than half of recent iterations crashed. Pause the loop and investigate."
            }
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    pub total_iterations: usize,
    pub total_crashes: usize,
    pub recent_crashes: usize,
    pub failure_rate: f64,
    pub status: HealthStatus,
    pub crash_patterns: BTreeMap<String, usize>,
    pub recommendation: String,
}

pub fn failure_rate(iterations: usize, crashes: usize) -> f64 {
    let attempts = iterations + crashes;
    if attempts == 0 {
        0.0
    } else {
        crashes as f64 / attempts as f64
    }
}

/// Builds the report for the `hours` window ending at `now` (local time, like the crash log).
pub fn get_health_report(
    crash_log: &Path,
    hours: u64,
    now: NaiveDateTime,
    iterations: &dyn IterationSource,
) -> Result<HealthReport, HealthError> {
    let window = Duration::hours(i64::try_from(hours).unwrap_or(i64::MAX).min(24 * 365 * 100));
    let since = now - window;

    let total_crashes = parse_crash_log(crash_log, None)?.len();
    let recent = parse_crash_log(crash_log, Some(since))?;
    let total_iterations = iterations.count_iterations_since(since);

    let rate = failure_rate(total_iterations, recent.len());
    let status = HealthStatus::from_failure_rate(rate);
    Ok(HealthReport {
        total_iterations,
        total_crashes,
        recent_crashes: recent.len(),
        failure_rate: rate,
        status,
        crash_patterns: analyze_crash_patterns(&recent),
        recommendation: status.recommendation().to_string(),
    })
}

pub fn format_report(report: &HealthReport, hours: u64) -> String {
    let mut lines = vec![
        format!(
            "{} Agent health: {} (last {hours}h)",
            report.status.badge(),
            report.status.as_str().to_uppercase()
        ),
        format!(
            "  Iterations: {} successful, {} crashed",
            report.total_iterations, report.recent_crashes
        ),
        format!("  Failure rate: {:.1}%", report.failure_rate * 100.0),
        format!("  Crashes on record: {}", report.total_crashes),
    ];
    if !report.crash_patterns.is_empty() {
        lines.push("  Crash patterns:".to_string());
        for (name, count) in &report.crash_patterns {
            lines.push(format!("    {name}: {count}"));
        }
    }
    lines.push(format!("  Recommendation: {}", report.recommendation));
    lines.join("\n")
}
