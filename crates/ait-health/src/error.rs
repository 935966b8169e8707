use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("failed to read crash log {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write crash log {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
