use ait_core::ContractError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task '{0}' not found")]
    NotFound(String),
    #[error("Task '{0}' is already running")]
    AlreadyRunning(String),
    #[error("No command specified")]
    NoCommand,
    #[error("Timeout waiting for task '{0}'")]
    WaitTimeout(String),
    #[error("Task '{0}' is still starting; retry shortly")]
    Starting(String),
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed json in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to launch runner {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TaskError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> TaskError + '_ {
        move |source| TaskError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path) -> impl FnOnce(serde_json::Error) -> TaskError + '_ {
        move |source| TaskError::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}
