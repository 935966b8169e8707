use crate::error::TaskError;
use crate::process::hostname;
use crate::store::TaskStore;
use ait_core::{now_timestamp, validate_task_id, TaskMeta, TaskStatus};
use std::fs;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, info, warn};

pub const RUNNER_SUBCOMMAND: &str = "__run";
pub const ITERATION_ENV: &str = "AI_ITERATION";

#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    pub task_id: String,
    pub argv: Vec<String>,
    pub description: String,
    pub issue: Option<u64>,
    /// Seconds; the store's configured default applies when `None`.
    pub timeout: Option<u64>,
    /// Loop iteration of the worker that started the task; read from `AI_ITERATION` when `None`.
    pub worker_iteration: Option<u64>,
}

impl StartRequest {
    pub fn new(task_id: impl Into<String>, argv: Vec<String>) -> Self {
        Self {
            task_id: task_id.into(),
            argv,
            ..Self::default()
        }
    }
}

impl TaskStore {
    /// Launches `request.argv` under a detached runner and records it as running.
    pub fn start_task(&self, request: StartRequest) -> Result<TaskMeta, TaskError> {
        validate_task_id(&request.task_id)?;
        if request.argv.is_empty() {
            return Err(TaskError::NoCommand);
        }
        let task_id = request.task_id.clone();

        if let Some(existing) = self.get_status(&task_id)? {
            if existing.status == TaskStatus::Running {
                return Err(TaskError::AlreadyRunning(task_id));
            }
            debug!(task_id = %task_id, "replacing finished task");
        }

        let dir = self.task_dir(&task_id);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(TaskError::io(&dir))?;
        }
        fs::create_dir_all(&dir).map_err(TaskError::io(&dir))?;

        let timeout = request
            .timeout
            .unwrap_or(self.config().default_timeout_secs);
        let mut meta = TaskMeta::new(task_id.clone(), request.argv, timeout);
        meta.description = request.description;
        meta.issue = request.issue;
        meta.started_at = now_timestamp();
        meta.machine = hostname();
        meta.worker_iteration = request
            .worker_iteration
            .or_else(|| parse_iteration(std::env::var(ITERATION_ENV).ok().as_deref()));
        // The runner reads argv and timeout back from meta.json, so it must exist first.
        self.write_meta(&meta)?;

        let program = self.runner_program()?;
        let spawned = Command::new(&program)
            .arg(RUNNER_SUBCOMMAND)
            .arg("--root")
            .arg(self.root())
            .arg(&task_id)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                meta.status = TaskStatus::Failed;
                meta.finished_at = Some(now_timestamp());
                self.persist(&meta)?;
                return Err(TaskError::Spawn { program, source });
            }
        };

        let pid = child.id();
        // Reap the runner so long-lived callers never see it as a zombie.
        thread::spawn(move || {
            let _ = child.wait();
        });

        self.write_pid(&task_id, pid)?;
        meta.pid = Some(pid);
        self.persist(&meta)?;
        info!(task_id = %task_id, pid, command = %meta.command, "started background task");
        Ok(meta)
    }

    fn runner_program(&self) -> Result<PathBuf, TaskError> {
        if let Some(program) = &self.config().runner_program {
            return Ok(program.clone());
        }
        std::env::current_exe().map_err(|source| TaskError::Spawn {
            program: PathBuf::from("bg-task"),
            source,
        })
    }
}

fn parse_iteration(raw: Option<&str>) -> Option<u64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring non-numeric {ITERATION_ENV}={raw}");
            None
        }
    }
}
