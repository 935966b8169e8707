use crate::issues::{IssueLookup, IssueState};
use ait_core::identity::DEFAULT_ROLE;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

pub const ROLE_ENV: &str = "AI_ROLE";
pub const ITERATION_ENV: &str = "AI_ITERATION";

const CHANGES_HEADING: &str = "## Changes";
const NEXT_HEADING: &str = "## Next";
const MAINTAIN_TAG: &str = "[maintain]";
const WORKER_ROLE: &str = "WORKER";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitType {
    Fix,
    Feat,
    Refactor,
    Docs,
    Test,
    Audit,
    Maintain,
    Chore,
}

impl CommitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitType::Fix => "fix",
            CommitType::Feat => "feat",
            CommitType::Refactor => "refactor",
            CommitType::Docs => "docs",
            CommitType::Test => "test",
            CommitType::Audit => "audit",
            CommitType::Maintain => "maintain",
            CommitType::Chore => "chore",
        }
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const TYPE_KEYWORDS: &[(&str, CommitType)] = &[
    ("fix", CommitType::Fix),
    ("bug", CommitType::Fix),
    ("hotfix", CommitType::Fix),
    ("add", CommitType::Feat),
    ("implement", CommitType::Feat),
    ("create", CommitType::Feat),
    ("introduce", CommitType::Feat),
    ("support", CommitType::Feat),
    ("feat", CommitType::Feat),
    ("refactor", CommitType::Refactor),
    ("restructure", CommitType::Refactor),
    ("simplify", CommitType::Refactor),
    ("doc", CommitType::Docs),
    ("test", CommitType::Test),
    ("audit", CommitType::Audit),
    ("review", CommitType::Audit),
];

/// Classifies a subject by its leading verb. A `[maintain]` tag anywhere wins.
pub fn detect_commit_type(subject: &str) -> CommitType {
    let lowered = subject.to_lowercase();
    if lowered.contains(MAINTAIN_TAG) {
        return CommitType::Maintain;
    }
    let first = lowered.split_whitespace().next().unwrap_or_default();
    let word = first.trim_matches(|c: char| !c.is_alphanumeric());
    TYPE_KEYWORDS
        .iter()
        .find(|(keyword, _)| word.starts_with(keyword))
        .map(|(_, commit_type)| *commit_type)
        .unwrap_or(CommitType::Chore)
}

/// `W` for WORKER, `M` for MANAGER and so on. Human commits (`USER` or no role) get none.
pub fn role_letter(role: &str) -> Option<char> {
    let role = role.trim();
    if role.is_empty() || role.eq_ignore_ascii_case(DEFAULT_ROLE) {
        return None;
    }
    role.chars()
        .next()
        .filter(char::is_ascii_alphabetic)
        .map(|letter| letter.to_ascii_uppercase())
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\[([A-Z])\](\d+):").expect("valid regex"))
}

/// One past the highest `[<letter>]N:` among `subjects`, or 1 when there is none.
pub fn next_iteration<'a>(subjects: impl IntoIterator<Item = &'a str>, letter: char) -> u64 {
    subjects
        .into_iter()
        .filter_map(|subject| {
            let caps = tag_pattern().captures(subject.trim())?;
            if !caps[1].starts_with(letter) {
                return None;
            }
            caps[2].parse::<u64>().ok()
        })
        .max()
        .map_or(1, |last| last + 1)
}

/// A numeric `AI_ITERATION` wins; otherwise the next number after the tagged commits in
/// `history` (one subject per line).
pub fn resolve_iteration(env_value: Option<&str>, letter: char, history: &str) -> u64 {
    env_value
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or_else(|| next_iteration(history.lines(), letter))
}

/// Issue numbers referenced as `Fixes #N`, `Part of #N`, `Re: #N` and similar, deduplicated.
pub fn issue_refs(message: &str) -> Vec<u64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:fix(?:es|ed)?|close[sd]?|resolve[sd]?|part of|re:|refs?)\s+#(\d+)")
            .expect("valid regex")
    });
    let mut refs: Vec<u64> = pattern
        .captures_iter(message)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();
    refs.sort_unstable();
    refs.dedup();
    refs
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookWarning {
    MissingChanges,
    MissingNext,
    NoIssueLink,
    ClosedIssue(u64),
}

impl fmt::Display for HookWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookWarning::MissingChanges => write!(f, "Missing '{CHANGES_HEADING}' section"),
            HookWarning::MissingNext => write!(f, "Missing '{NEXT_HEADING}' section"),
            HookWarning::NoIssueLink => {
                f.write_str("No issue link (add Fixes #N, Part of #N or Re: #N)")
            }
            HookWarning::ClosedIssue(number) => write!(f, "Issue #{number} is already closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    Merge,
    AlreadyTagged,
    HumanCommit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Skipped(SkipReason),
    Rewritten {
        message: String,
        warnings: Vec<HookWarning>,
    },
}

#[derive(Debug, Clone)]
pub struct CommitContext {
    pub role: String,
    pub iteration: u64,
    pub timestamp: DateTime<Utc>,
}

/// Prefixes the subject with `[<role letter>]<iteration>:` and appends the
/// `Type`/`Role`/`Iteration`/`Timestamp` trailers.
///
/// Merge commits, human commits and messages that already carry a tag are left alone.
/// Structural problems only produce warnings; the commit is never rejected.
pub fn process_commit_message(
    message: &str,
    ctx: &CommitContext,
    issues: &dyn IssueLookup,
) -> CommitOutcome {
    let normalized = message.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.lines().collect();
    let Some(start) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return CommitOutcome::Skipped(SkipReason::Empty);
    };
    let subject = lines[start].trim();
    if subject.starts_with("Merge ") {
        return CommitOutcome::Skipped(SkipReason::Merge);
    }
    if tag_pattern().is_match(subject) {
        return CommitOutcome::Skipped(SkipReason::AlreadyTagged);
    }
    let Some(letter) = role_letter(&ctx.role) else {
        return CommitOutcome::Skipped(SkipReason::HumanCommit);
    };

    let commit_type = detect_commit_type(subject);
    let mut warnings = Vec::new();
    if !has_heading(&lines, CHANGES_HEADING) {
        warnings.push(HookWarning::MissingChanges);
    }
    if !has_heading(&lines, NEXT_HEADING) {
        warnings.push(HookWarning::MissingNext);
    }
    let refs = issue_refs(&normalized);
    let is_worker = ctx.role.trim().eq_ignore_ascii_case(WORKER_ROLE);
    if refs.is_empty() {
        if is_worker && commit_type != CommitType::Maintain {
            warnings.push(HookWarning::NoIssueLink);
        }
    } else {
        warnings.extend(
            refs.into_iter()
                .filter(|number| issues.issue_state(*number) == Some(IssueState::Closed))
                .map(HookWarning::ClosedIssue),
        );
    }

    let mut sections = vec![format!("[{letter}]{}: {subject}", ctx.iteration)];
    let body = lines[start + 1..].join("\n");
    let body = body.trim_start_matches('\n').trim_end();
    if !body.is_empty() {
        sections.push(body.to_string());
    }
    sections.push(format!(
        "Type: {commit_type}\nRole: {}\nIteration: {}\nTimestamp: {}",
        ctx.role.trim(),
        ctx.iteration,
        ctx.timestamp.format("%Y-%m-%dT%H:%M:%SZ")
    ));

    CommitOutcome::Rewritten {
        message: format!("{}\n", sections.join("\n\n")),
        warnings,
    }
}

fn has_heading(lines: &[&str], heading: &str) -> bool {
    lines
        .iter()
        .any(|line| line.trim_start().starts_with(heading))
}
