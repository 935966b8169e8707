use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

pub const LOG_LEVEL_ENV: &str = "BG_TASK_LOG_LEVEL";

fn env_filter(default_level: &str) -> EnvFilter {
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_level.to_string());
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Interactive commands log to stderr so stdout stays parseable.
pub fn init_cli_logging() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter("warn"))
        .with_writer(io::stderr)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// The detached runner has no terminal; it logs into the task directory.
pub fn init_runner_logging(path: &Path) -> Option<LogGuard> {
    let guard = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => LogGuard {
            file: Arc::new(Mutex::new(file)),
        },
        Err(_) => return None,
    };
    let file = guard.file.clone();
    let make_writer = BoxMakeWriter::new(move || FileWriter { file: file.clone() });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter("info"))
        .with_writer(make_writer)
        .with_ansi(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(guard)
}

pub struct LogGuard {
    file: Arc<Mutex<File>>,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

struct FileWriter {
    file: Arc<Mutex<File>>,
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
        Ok(())
    }
}
