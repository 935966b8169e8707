use ait_core::git::git_output;
use chrono::NaiveDateTime;
use std::path::PathBuf;
use tracing::warn;

const WORKER_SUBJECT_PREFIX: &str = "[W]";

/// Counts successful worker iterations since a point in time.
pub trait IterationSource {
    fn count_iterations_since(&self, since: NaiveDateTime) -> usize;
}

/// Worker iterations are the commits whose subject starts with `[W]`.
#[derive(Debug, Clone, Default)]
pub struct GitIterationSource {
    pub repo: Option<PathBuf>,
}

impl GitIterationSource {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: Some(repo.into()),
        }
    }
}

impl IterationSource for GitIterationSource {
    fn count_iterations_since(&self, since: NaiveDateTime) -> usize {
        let since_arg = format!("--since={}", since.format("%Y-%m-%d %H:%M:%S"));
        match git_output(&["log", &since_arg, "--format=%s"], self.repo.as_deref()) {
            Some(subjects) => count_worker_subjects(&subjects),
            None => {
                warn!("git log failed; counting zero iterations");
                0
            }
        }
    }
}

pub fn count_worker_subjects(subjects: &str) -> usize {
    subjects
        .lines()
        .filter(|line| line.trim_start().starts_with(WORKER_SUBJECT_PREFIX))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_worker_subjects() {
        assert_eq!(count_worker_subjects("[W]1: First\n[W]2: Second\n[W]3: Third\n"), 3);
        assert_eq!(count_worker_subjects("[M] manager\nfix typo\n[W]9: work"), 1);
        assert_eq!(count_worker_subjects(""), 0);
    }

    #[test]
    fn git_failure_counts_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = GitIterationSource::new(dir.path());
        let since = chrono::Local::now().naive_local();
        assert_eq!(source.count_iterations_since(since), 0);
    }
}
