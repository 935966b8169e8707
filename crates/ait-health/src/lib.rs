//! Crash-log parsing and the rolling health report for the agent loop.

pub mod cli;
pub mod crashes;
pub mod error;
pub mod iterations;
pub mod report;

pub use crashes::{analyze_crash_patterns, append_crash, parse_crash_log};
pub use error::HealthError;
pub use iterations::{GitIterationSource, IterationSource};
pub use report::{format_report, get_health_report, HealthReport, HealthStatus};
