use ait_core::Identity;
use regex::Regex;
use std::sync::OnceLock;

/// Replaces a leading `[project]` tag (and any `[R]123` role tag) with the current project.
pub fn fix_title(title: &str, identity: &Identity) -> String {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| {
        Regex::new(r"^\[[^\]]*\](?:\[[A-Za-z]\]\d*)?\s*").expect("valid regex")
    });
    let rest = prefix.replace(title, "");
    format!("[{}] {rest}", identity.project)
}
