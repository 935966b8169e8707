use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Some(IssueState::Open),
            "CLOSED" => Some(IssueState::Closed),
            _ => None,
        }
    }
}

/// Where referenced issues are checked. `None` means the state could not be determined.
pub trait IssueLookup {
    fn issue_state(&self, number: u64) -> Option<IssueState>;
}

/// Asks `gh issue view`. Offline, unauthenticated or missing `gh` all yield `None`.
#[derive(Debug, Clone)]
pub struct GhIssues {
    program: String,
}

impl GhIssues {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GhIssues {
    fn default() -> Self {
        Self::new("gh")
    }
}

impl IssueLookup for GhIssues {
    fn issue_state(&self, number: u64) -> Option<IssueState> {
        let output = Command::new(&self.program)
            .args(["issue", "view", &number.to_string(), "--json", "state", "--jq", ".state"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();
        match output {
            Ok(output) if output.status.success() => {
                IssueState::parse(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                debug!(number, status = %output.status, "gh could not view issue");
                None
            }
            Err(err) => {
                debug!(number, program = %self.program, "gh unavailable: {err}");
                None
            }
        }
    }
}
