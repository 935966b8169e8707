use crate::args::parse_gh_args;
use crate::body::process_body;
use crate::title::fix_title;
use ait_core::Identity;
use chrono::{DateTime, Utc};
use tracing::debug;

const TAGGED_COMMANDS: [&str; 3] = ["issue", "pr", "discussion"];
const BODY_SUBCOMMANDS: [&str; 3] = ["create", "comment", "edit"];

/// Rewrites title and body arguments of posting commands; anything else passes through.
pub fn rewrite_gh_args(
    args: &[String],
    identity: &Identity,
    commit: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<String> {
    let parsed = parse_gh_args(args);
    let mut rewritten = args.to_vec();
    if !TAGGED_COMMANDS.contains(&parsed.command.as_str()) {
        debug!(command = %parsed.command, "passing through untouched");
        return rewritten;
    }

    if parsed.subcommand == "create" {
        if let Some(idx) = parsed.title_index {
            rewritten[idx] = match &parsed.title_value {
                Some(title) => format!("--title={}", fix_title(title, identity)),
                None => fix_title(&args[idx], identity),
            };
        }
    }

    if BODY_SUBCOMMANDS.contains(&parsed.subcommand.as_str()) {
        if let Some(idx) = parsed.body_index {
            rewritten[idx] = match &parsed.body_value {
                Some(body) => format!("--body={}", process_body(body, identity, commit, now)),
                None => process_body(&args[idx], identity, commit, now),
            };
        }
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        ait_core::parse_timestamp("2026-01-01T00:00:00Z").expect("timestamp")
    }

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|word| word.to_string()).collect()
    }

    fn worker() -> Identity {
        Identity::new("proj", "WORKER").with_iteration("7")
    }

    #[test]
    fn rewrites_issue_create() {
        let out = rewrite_gh_args(
            &args(&["issue", "create", "--title", "[old] Bug", "--body", "Details"]),
            &worker(),
            Some("abc1234"),
            now(),
        );
        assert_eq!(out[3], "[proj] Bug");
        assert!(out[5].starts_with("**FROM:** proj [WORKER]7\n\nDetails\n\n---\n"));
        assert!(out[5].ends_with("proj | WORKER #7 | abc1234 | 2026-01-01T00:00:00Z"));
    }

    #[test]
    fn rewrites_inline_forms() {
        let out = rewrite_gh_args(
            &args(&["pr", "create", "--title=Add feature", "--body=Body"]),
            &worker(),
            None,
            now(),
        );
        assert_eq!(out[2], "--title=[proj] Add feature");
        assert!(out[3].starts_with("--body=**FROM:** proj [WORKER]7\n\nBody"));
    }

    #[test]
    fn comment_keeps_title_untouched_and_tags_body() {
        let out = rewrite_gh_args(
            &args(&["issue", "comment", "42", "--body", "Done"]),
            &worker(),
            None,
            now(),
        );
        assert_eq!(out[2], "42");
        assert!(out[4].contains("**FROM:** proj [WORKER]7"));

        let edit = rewrite_gh_args(
            &args(&["issue", "edit", "42", "--title", "[x] Keep", "--body", "New"]),
            &worker(),
            None,
            now(),
        );
        assert_eq!(edit[4], "[x] Keep");
        assert!(edit[6].starts_with("**FROM:**"));
    }

    #[test]
    fn other_commands_pass_through() {
        let original = args(&["repo", "view", "--body", "x"]);
        assert_eq!(rewrite_gh_args(&original, &worker(), None, now()), original);
        let listing = args(&["issue", "list", "--label", "mail"]);
        assert_eq!(rewrite_gh_args(&listing, &worker(), None, now()), listing);
    }
}
