use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Runs `git <args>` and returns trimmed stdout when it exits successfully.
pub fn git_output(args: &[&str], cwd: Option<&Path>) -> Option<String> {
    let mut command = Command::new("git");
    command.args(args);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    match command.output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        Ok(output) => {
            debug!(?args, status = %output.status, "git exited unsuccessfully");
            None
        }
        Err(err) => {
            debug!(?args, "git unavailable: {err}");
            None
        }
    }
}

/// `git rev-parse --show-toplevel`, or the current directory outside a repository.
pub fn toplevel() -> PathBuf {
    git_output(&["rev-parse", "--show-toplevel"], None)
        .filter(|root| !root.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outside_a_repository_yields_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(git_output(&["rev-parse", "--show-toplevel"], Some(dir.path())), None);
    }

    #[test]
    fn toplevel_is_never_empty() {
        assert!(!toplevel().as_os_str().is_empty());
    }
}
