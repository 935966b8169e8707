use ait_core::git::git_output;
use ait_core::identity::{project_from_remote_url, DEFAULT_ROLE};
use ait_core::Identity;
use std::path::PathBuf;

pub const PROJECT_ENV: &str = "AI_PROJECT";
pub const ROLE_ENV: &str = "AI_ROLE";
pub const ITERATION_ENV: &str = "AI_ITERATION";
pub const SESSION_ENV: &str = "AI_SESSION";

/// Repository facts the identity and signature depend on.
pub trait RepoInfo {
    fn origin_url(&self) -> Option<String>;
    fn short_commit(&self) -> Option<String>;
    fn dir_name(&self) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct GitRepo {
    pub dir: Option<PathBuf>,
}

impl RepoInfo for GitRepo {
    fn origin_url(&self) -> Option<String> {
        git_output(&["remote", "get-url", "origin"], self.dir.as_deref())
    }

    fn short_commit(&self) -> Option<String> {
        git_output(&["rev-parse", "--short", "HEAD"], self.dir.as_deref())
            .filter(|sha| !sha.is_empty())
    }

    fn dir_name(&self) -> Option<String> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().ok()?,
        };
        dir.file_name().map(|name| name.to_string_lossy().into_owned())
    }
}

/// Resolves the poster's identity from `AI_*` variables, falling back to the repository.
pub fn resolve_identity(env: impl Fn(&str) -> Option<String>, repo: &dyn RepoInfo) -> Identity {
    let var = |key: &str| {
        env(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let project = var(PROJECT_ENV)
        .or_else(|| repo.origin_url().as_deref().and_then(project_from_remote_url))
        .or_else(|| repo.dir_name())
        .unwrap_or_else(|| "unknown".to_string());
    let role = var(ROLE_ENV).unwrap_or_else(|| DEFAULT_ROLE.to_string());

    Identity::new(project, role)
        .with_iteration(var(ITERATION_ENV).unwrap_or_default())
        .with_session(var(SESSION_ENV).unwrap_or_default())
}

pub fn identity_from_env(repo: &dyn RepoInfo) -> Identity {
    resolve_identity(|key| std::env::var(key).ok(), repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeRepo {
        origin: Option<&'static str>,
        dir: Option<&'static str>,
    }

    impl RepoInfo for FakeRepo {
        fn origin_url(&self) -> Option<String> {
            self.origin.map(str::to_string)
        }

        fn short_commit(&self) -> Option<String> {
            Some("abc1234".to_string())
        }

        fn dir_name(&self) -> Option<String> {
            self.dir.map(str::to_string)
        }
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_vars_win() {
        let identity = resolve_identity(
            env_of(&[
                ("AI_PROJECT", "myproj"),
                ("AI_ROLE", "MANAGER"),
                ("AI_ITERATION", "42"),
                ("AI_SESSION", "sess123"),
            ]),
            &FakeRepo {
                origin: Some("https://github.com/owner/other.git"),
                ..FakeRepo::default()
            },
        );
        assert_eq!(identity.project, "myproj");
        assert_eq!(identity.role, "MANAGER");
        assert_eq!(identity.iteration, "42");
        assert_eq!(identity.session, "sess123");
    }

    #[test]
    fn falls_back_to_origin_then_directory() {
        let from_ssh = resolve_identity(
            env_of(&[]),
            &FakeRepo {
                origin: Some("git@github.com:owner/myrepo.git"),
                dir: Some("checkout"),
            },
        );
        assert_eq!(from_ssh.project, "myrepo");
        assert_eq!(from_ssh.role, "USER");
        assert!(from_ssh.iteration.is_empty());

        let from_dir = resolve_identity(
            env_of(&[("AI_PROJECT", "  ")]),
            &FakeRepo {
                origin: None,
                dir: Some("checkout"),
            },
        );
        assert_eq!(from_dir.project, "checkout");
    }
}
