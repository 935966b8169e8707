use serde::{Deserialize, Serialize};

pub const DEFAULT_ROLE: &str = "USER";

/// Who is posting: project, role and the optional loop iteration / session.
///
/// Empty strings mean "not set"; they are rendered by omission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub project: String,
    pub role: String,
    #[serde(default)]
    pub iteration: String,
    #[serde(default)]
    pub session: String,
}

impl Identity {
    pub fn new(project: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            role: role.into(),
            iteration: String::new(),
            session: String::new(),
        }
    }

    pub fn with_iteration(mut self, iteration: impl Into<String>) -> Self {
        self.iteration = iteration.into();
        self
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = session.into();
        self
    }
}

/// Extracts the repository name from an https or ssh git remote URL.
pub fn project_from_remote_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let tail = trimmed.rsplit(['/', ':']).next()?;
    let name = tail.strip_suffix(".git").unwrap_or(tail);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
