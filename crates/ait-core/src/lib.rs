use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

pub mod crash_log;
pub mod git;
pub mod identity;

pub use crash_log::CrashEntry;
pub use identity::Identity;

pub const MAX_TASK_ID_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("invalid task id '{0}': use letters, digits, '.', '_' or '-'")]
    InvalidTaskId(String),
    #[error("unknown task status: {0}")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
    Killed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Running
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Killed => "killed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ContractError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "killed" => Ok(TaskStatus::Killed),
            other => Err(ContractError::UnknownStatus(other.to_string())),
        }
    }
}

/// Per-task metadata record persisted as `meta.json`.
///
/// `started_at` stays a raw string so that a record with a mangled timestamp
/// still loads; consumers parse it on demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskMeta {
    pub task_id: String,
    pub command: String,
    #[serde(default)]
    pub argv: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub issue: Option<u64>,
    pub timeout: u64,
    #[serde(default)]
    pub status: TaskStatus,
    pub started_at: String,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub machine: Option<String>,
    #[serde(default)]
    pub worker_iteration: Option<u64>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl TaskMeta {
    pub fn new(task_id: impl Into<String>, argv: Vec<String>, timeout: u64) -> Self {
        Self {
            task_id: task_id.into(),
            command: shell_join(&argv),
            argv,
            description: String::new(),
            issue: None,
            timeout,
            status: TaskStatus::Running,
            started_at: String::new(),
            finished_at: None,
            pid: None,
            exit_code: None,
            machine: None,
            worker_iteration: None,
            extra: HashMap::new(),
        }
    }

    pub fn started_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        parse_timestamp(&self.started_at)
    }

    pub fn finished_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.finished_at.as_deref().and_then(parse_timestamp)
    }
}

/// Manifest entry; a denormalized view of [`TaskMeta`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskSummary {
    pub status: TaskStatus,
    #[serde(default)]
    pub started_at: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub issue: Option<u64>,
    #[serde(default)]
    pub pid: Option<u32>,
}

impl From<&TaskMeta> for TaskSummary {
    fn from(meta: &TaskMeta) -> Self {
        Self {
            status: meta.status,
            started_at: meta.started_at.clone(),
            description: meta.description.clone(),
            issue: meta.issue,
            pid: meta.pid,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskSummary>,
}

/// Outcome written by the detached runner as `result.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskResult {
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub signal: Option<i32>,
}

pub fn validate_task_id(task_id: &str) -> Result<(), ContractError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid regex"));
    if task_id.len() > MAX_TASK_ID_LEN
        || task_id == "."
        || task_id == ".."
        || !pattern.is_match(task_id)
    {
        return Err(ContractError::InvalidTaskId(task_id.to_string()));
    }
    Ok(())
}

pub fn parse_timestamp(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&chrono::Utc))
}

pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
}

pub fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    if seconds < 60.0 {
        format!("{seconds:.0}s")
    } else if seconds < 3600.0 {
        format!("{:.1}m", seconds / 60.0)
    } else {
        format!("{:.1}h", seconds / 3600.0)
    }
}

/// Joins argv into a single display string, quoting words a POSIX shell would split.
pub fn shell_join(argv: &[String]) -> String {
    argv.iter()
        .map(|word| shell_quote(word))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "-_./=:,@%+".contains(ch));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}
