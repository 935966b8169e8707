use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const CRASH_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One abnormal agent termination, as recorded by the supervisor loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashEntry {
    pub timestamp: NaiveDateTime,
    pub iteration: u64,
    pub message: String,
}

impl CrashEntry {
    pub fn new(timestamp: NaiveDateTime, iteration: u64, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            iteration,
            message: message.into(),
        }
    }

    /// Renders the `[YYYY-MM-DD HH:MM:SS] Iteration N: message` log line (no newline).
    pub fn to_line(&self) -> String {
        format!(
            "[{}] Iteration {}: {}",
            self.timestamp.format(CRASH_TIMESTAMP_FORMAT),
            self.iteration,
            self.message.replace('\n', " ")
        )
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^\[(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\] Iteration (\d+): (.*)$")
                .expect("valid regex")
        });
        let caps = pattern.captures(line.trim_end_matches(['\r', '\n']))?;
        let timestamp = NaiveDateTime::parse_from_str(&caps[1], CRASH_TIMESTAMP_FORMAT).ok()?;
        let iteration = caps[2].parse::<u64>().ok()?;
        Some(Self {
            timestamp,
            iteration,
            message: caps[3].to_string(),
        })
    }
}
