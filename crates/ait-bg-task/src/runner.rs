use crate::error::TaskError;
use crate::process::{is_group_alive, signal_group};
use crate::store::TaskStore;
use ait_core::{now_timestamp, TaskMeta, TaskResult};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub const TIMEOUT_EXIT_CODE: i32 = 124;
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

const GROUP_POLL: Duration = Duration::from_millis(50);

/// Body of the hidden `__run` subcommand: runs the task's command to completion
/// and records the outcome in `result.json`.
pub fn run_supervised(store: &TaskStore, task_id: &str) -> Result<TaskResult, TaskError> {
    let meta = store
        .read_meta(task_id)?
        .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(TaskError::Runtime)?;
    let result = runtime.block_on(supervise(store, &meta))?;

    store.write_result(task_id, &result)?;
    info!(
        task_id,
        exit_code = ?result.exit_code,
        timed_out = result.timed_out,
        "task finished"
    );
    Ok(result)
}

async fn supervise(store: &TaskStore, meta: &TaskMeta) -> Result<TaskResult, TaskError> {
    let log_path = store.log_path(&meta.task_id);
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(TaskError::io(&log_path))?;
    let log_err = log.try_clone().map_err(TaskError::io(&log_path))?;

    // The command leads its own group so a timeout or kill reaches everything it forks.
    let mut command = build_command(meta);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .process_group(0);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(task_id = %meta.task_id, "failed to spawn command: {err}");
            append_line(
                &log_path,
                &format!("bg-task: failed to start '{}': {err}", meta.command),
            );
            return Ok(TaskResult {
                exit_code: Some(SPAWN_FAILURE_EXIT_CODE),
                finished_at: Some(now_timestamp()),
                ..TaskResult::default()
            });
        }
    };
    let pgid = child.id();
    if let Some(pgid) = pgid {
        store.write_command_pid(&meta.task_id, pgid)?;
    }
    info!(task_id = %meta.task_id, pid = ?pgid, "command spawned");

    let status = if meta.timeout == 0 {
        Some(child.wait().await.map_err(TaskError::io(&log_path))?)
    } else {
        let limit = Duration::from_secs(meta.timeout);
        tokio::select! {
            status = child.wait() => Some(status.map_err(TaskError::io(&log_path))?),
            _ = tokio::time::sleep(limit) => None,
        }
    };

    let result = match status {
        Some(status) => result_from_status(status),
        None => {
            warn!(task_id = %meta.task_id, timeout = meta.timeout, "timed out; terminating");
            if let Some(pgid) = pgid {
                stop_group(&mut child, pgid, store.config().kill_grace()).await;
            }
            append_line(
                &log_path,
                &format!("bg-task: timed out after {}s", meta.timeout),
            );
            TaskResult {
                exit_code: Some(TIMEOUT_EXIT_CODE),
                finished_at: Some(now_timestamp()),
                timed_out: true,
                signal: None,
            }
        }
    };
    Ok(result)
}

fn build_command(meta: &TaskMeta) -> Command {
    match meta.argv.split_first() {
        Some((program, args)) => {
            let mut command = Command::new(program);
            command.args(args);
            command
        }
        // Legacy records only carry the joined command line.
        None => {
            let mut command = Command::new("sh");
            command.arg("-c").arg(&meta.command);
            command
        }
    }
}

/// SIGTERM the command's group, give it `grace` to drain, then SIGKILL any survivor.
/// Returns once the direct child is reaped.
async fn stop_group(child: &mut Child, pgid: u32, grace: Duration) {
    if let Err(err) = signal_group(pgid, Signal::SIGTERM) {
        if err != Errno::ESRCH {
            warn!(pgid, "SIGTERM failed: {err}");
        }
    }

    let deadline = Instant::now() + grace;
    if tokio::time::timeout(grace, child.wait()).await.is_ok() {
        // The leader is reaped; its forks may still be draining.
        while Instant::now() < deadline && is_group_alive(pgid) {
            tokio::time::sleep(GROUP_POLL).await;
        }
    }

    if is_group_alive(pgid) {
        debug!(pgid, "escalating to SIGKILL");
        if let Err(err) = signal_group(pgid, Signal::SIGKILL) {
            if err != Errno::ESRCH {
                warn!(pgid, "SIGKILL failed: {err}");
            }
        }
    }
    if let Err(err) = child.wait().await {
        warn!(pgid, "failed to reap command: {err}");
    }
}

fn result_from_status(status: ExitStatus) -> TaskResult {
    let (exit_code, signal) = match (status.code(), status.signal()) {
        (Some(code), _) => (Some(code), None),
        (None, Some(signal)) => (Some(128 + signal), Some(signal)),
        (None, None) => (None, None),
    };
    TaskResult {
        exit_code,
        finished_at: Some(now_timestamp()),
        timed_out: false,
        signal,
    }
}

fn append_line(path: &Path, line: &str) {
    let outcome = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file: File| writeln!(file, "{line}"));
    if let Err(err) = outcome {
        warn!(path = %path.display(), "failed to append to log: {err}");
    }
}
