use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BgTaskConfig {
    pub default_timeout_secs: u64,
    pub kill_grace_ms: u64,
    pub poll_interval_ms: u64,
    pub cleanup_days: u64,
    pub tail_lines: usize,
    /// Executable that hosts the detached runner; `current_exe()` when unset.
    pub runner_program: Option<PathBuf>,
}

impl Default for BgTaskConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            kill_grace_ms: 1_000,
            poll_interval_ms: 1_000,
            cleanup_days: 7,
            tail_lines: 50,
            runner_program: None,
        }
    }
}

impl BgTaskConfig {
    /// Loads `<root>/config.json`, falling back to the user config dir, then defaults.
    pub fn load(root: &Path) -> Self {
        let mut candidates = vec![root.join(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("ait").join("bg-task.json"));
        }

        for path in candidates {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            match serde_json::from_str::<BgTaskConfig>(&content) {
                Ok(config) => return config,
                Err(err) => {
                    warn!(path = %path.display(), "ignoring malformed config: {err}");
                }
            }
        }
        Self::default()
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}
