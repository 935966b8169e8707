use ait_core::Identity;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

const HEADER_PREFIX: &str = "**FROM:**";
const SIGNATURE_RULE: &str = "---";
const SESSION_PREFIX_LEN: usize = 8;
const MIN_COMPACT_FIELDS: usize = 4;

/// Strips any identity header and trailing signature blocks so they can be regenerated.
pub fn clean_body(body: &str) -> String {
    let normalized = body.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<&str> = normalized.lines().collect();

    loop {
        let blanks = lines.iter().take_while(|line| line.trim().is_empty()).count();
        lines.drain(..blanks);
        match lines.first() {
            Some(first) if first.starts_with(HEADER_PREFIX) => {
                lines.remove(0);
            }
            _ => break,
        }
    }

    loop {
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }
        match signature_start(&lines) {
            Some(idx) => lines.truncate(idx),
            None => break,
        }
    }

    lines.join("\n").trim_end().to_string()
}

/// Index of the `---` line opening a trailing signature block, if the body ends with one.
fn signature_start(lines: &[&str]) -> Option<usize> {
    let rule = lines.iter().rposition(|line| line.trim_end() == SIGNATURE_RULE)?;
    let tail = &lines[rule + 1..];
    if tail.is_empty() || tail.iter().any(|line| line.trim().is_empty()) {
        return None;
    }
    let compact = tail.len() == 1 && is_compact_signature(tail[0]);
    let legacy = tail.iter().all(|line| is_legacy_signature_line(line));
    (compact || legacy).then_some(rule)
}

/// `project | role | ... | timestamp`: a bare project name and at least four fields joined
/// by a single-spaced ` | `. Tab-separated or unspaced pipes are content.
fn is_compact_signature(line: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"^[\w-]+(?: \| [^|\t]*[^|\s])+$").expect("valid regex"));
    let line = line.trim_end();
    pattern.is_match(line) && line.split(" | ").count() >= MIN_COMPACT_FIELDS
}

fn is_legacy_signature_line(line: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^(Project|Role|Iteration|Session|Commit|Timestamp):\s*\S.*$")
            .expect("valid regex")
    });
    pattern.is_match(line.trim())
}

pub fn build_header(identity: &Identity) -> String {
    format!(
        "{HEADER_PREFIX} {} [{}]{}",
        identity.project, identity.role, identity.iteration
    )
}

pub fn build_signature(identity: &Identity, commit: Option<&str>, now: DateTime<Utc>) -> String {
    let mut fields = Vec::with_capacity(5);
    fields.push(identity.project.clone());
    if identity.iteration.is_empty() {
        fields.push(identity.role.clone());
    } else {
        fields.push(format!("{} #{}", identity.role, identity.iteration));
    }
    if !identity.session.is_empty() {
        fields.push(identity.session.chars().take(SESSION_PREFIX_LEN).collect());
    }
    fields.push(commit.filter(|commit| !commit.is_empty()).unwrap_or("-").to_string());
    fields.push(now.format("%Y-%m-%dT%H:%M:%SZ").to_string());
    format!("{SIGNATURE_RULE}\n{}", fields.join(" | "))
}

/// Header, cleaned body and a fresh signature, separated by blank lines.
pub fn process_body(
    body: &str,
    identity: &Identity,
    commit: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let cleaned = clean_body(body);
    let mut sections = vec![build_header(identity)];
    if !cleaned.is_empty() {
        sections.push(cleaned);
    }
    sections.push(build_signature(identity, commit, now));
    sections.join("\n\n")
}
