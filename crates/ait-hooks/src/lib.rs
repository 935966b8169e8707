//! Git hooks that tag agent commits with their role and loop iteration.

pub mod commit_msg;
pub mod issues;

pub use commit_msg::{
    detect_commit_type, issue_refs, next_iteration, process_commit_message, resolve_iteration,
    role_letter, CommitContext, CommitOutcome, CommitType, HookWarning, SkipReason,
};
pub use issues::{GhIssues, IssueLookup, IssueState};
