use crate::error::HealthError;
use ait_core::CrashEntry;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Parses the crash log, newest first. A missing log has no crashes.
pub fn parse_crash_log(
    path: &Path,
    since: Option<NaiveDateTime>,
) -> Result<Vec<CrashEntry>, HealthError> {
    let content = match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(HealthError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut entries: Vec<CrashEntry> = content
        .lines()
        .filter_map(CrashEntry::parse_line)
        .filter(|entry| since.map_or(true, |since| entry.timestamp >= since))
        .collect();
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(entries)
}

pub fn append_crash(path: &Path, entry: &CrashEntry) -> Result<(), HealthError> {
    let write_err = |source| HealthError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;
    writeln!(file, "{}", entry.to_line()).map_err(write_err)
}

pub fn classify_crash(message: &str) -> &'static str {
    let lowered = message.to_lowercase();
    if lowered.contains("killed by signal") {
        "signal_kill"
    } else if lowered.contains("timed out") {
        "timeout"
    } else if lowered.contains("exited with code") {
        "exit_error"
    } else {
        "unknown"
    }
}

pub fn analyze_crash_patterns(entries: &[CrashEntry]) -> BTreeMap<String, usize> {
    let mut patterns = BTreeMap::new();
    for entry in entries {
        *patterns
            .entry(classify_crash(&entry.message).to_string())
            .or_insert(0) += 1;
    }
    patterns
}
