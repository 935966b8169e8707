//! Identity tagging for GitHub posts made through `gh`.

pub mod args;
pub mod body;
pub mod identity;
pub mod title;
pub mod wrapper;

pub use args::{parse_gh_args, GhArgs};
pub use body::{build_header, build_signature, clean_body, process_body};
pub use identity::{identity_from_env, resolve_identity, GitRepo, RepoInfo};
pub use title::fix_title;
pub use wrapper::rewrite_gh_args;
