use crate::error::TaskError;
use crate::process::{terminate_group, Termination};
use crate::store::TaskStore;
use ait_core::{now_timestamp, validate_task_id, TaskMeta, TaskStatus};
use chrono::{Duration as ChronoDuration, Utc};
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use std::collections::{BTreeSet, VecDeque};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const NO_OUTPUT: &str = "(no output)";
const MAX_CLEANUP_DAYS: u64 = 36_500;

impl TaskStore {
    /// Last `lines` lines of the task's combined output; `(no output)` when there is no log,
    /// including for ids that were never started.
    pub fn tail_output(&self, task_id: &str, lines: usize) -> Result<String, TaskError> {
        validate_task_id(task_id)?;
        let path = self.log_path(task_id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(NO_OUTPUT.to_string());
            }
            Err(err) => return Err(TaskError::io(&path)(err)),
        };

        let mut window = VecDeque::with_capacity(lines.min(4096));
        for line in BufReader::new(file).split(b'\n') {
            let line = line.map_err(TaskError::io(&path))?;
            if lines == 0 {
                continue;
            }
            if window.len() == lines {
                window.pop_front();
            }
            window.push_back(String::from_utf8_lossy(&line).into_owned());
        }
        Ok(window.into_iter().collect::<Vec<_>>().join("\n"))
    }

    /// Redraws the tail on `out` every poll interval until the task stops running.
    pub fn tail_follow<W: Write>(
        &self,
        task_id: &str,
        lines: usize,
        out: &mut W,
    ) -> Result<TaskMeta, TaskError> {
        let poll = self.config().poll_interval();
        loop {
            let meta = self.update_task_status(task_id)?;
            let tail = self.tail_output(task_id, lines)?;
            let log_path = self.log_path(task_id);
            execute!(out, Clear(ClearType::All), MoveTo(0, 0))
                .map_err(TaskError::io(&log_path))?;
            writeln!(out, "{tail}").map_err(TaskError::io(&log_path))?;
            if meta.status.is_terminal() {
                writeln!(out, "\nTask {} {}", meta.task_id, meta.status)
                    .map_err(TaskError::io(&log_path))?;
                return Ok(meta);
            }
            out.flush().map_err(TaskError::io(&log_path))?;
            thread::sleep(poll);
        }
    }

    /// Terminates a running task's process groups and marks it killed.
    pub fn kill_task(&self, task_id: &str) -> Result<TaskMeta, TaskError> {
        let mut meta = self.update_task_status(task_id)?;
        if meta.status != TaskStatus::Running {
            debug!(task_id, status = %meta.status, "kill on finished task");
            return Ok(meta);
        }

        let Some(pid) = self.await_runner_pid(&meta)? else {
            // The launcher has not recorded the runner yet and would overwrite our status.
            return Err(TaskError::Starting(task_id.to_string()));
        };

        let grace = self.config().kill_grace();
        // Command group first so the runner can still record how it ended.
        if let Some(command_pid) = self.read_command_pid(task_id)? {
            if terminate_group(command_pid, grace) == Termination::Killed {
                warn!(task_id, pid = command_pid, "command ignored SIGTERM; sent SIGKILL");
            }
        }
        if terminate_group(pid, grace) == Termination::Killed {
            warn!(task_id, pid, "runner ignored SIGTERM; sent SIGKILL");
        }

        meta.status = TaskStatus::Killed;
        meta.finished_at = Some(now_timestamp());
        self.persist(&meta)?;
        info!(task_id, "task killed");
        Ok(meta)
    }

    /// Runner pid of a running task, waiting up to the kill grace for a launch in progress.
    fn await_runner_pid(&self, meta: &TaskMeta) -> Result<Option<u32>, TaskError> {
        if let Some(pid) = meta.pid {
            return Ok(Some(pid));
        }
        let deadline = Instant::now() + self.config().kill_grace();
        loop {
            if let Some(pid) = self.read_pid(&meta.task_id)? {
                return Ok(Some(pid));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(self.config().poll_interval());
        }
    }

    /// Polls until the task leaves `running` or `timeout` elapses.
    pub fn wait_for_task(
        &self,
        task_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<TaskMeta, TaskError> {
        let deadline = Instant::now() + timeout;
        loop {
            let meta = self.update_task_status(task_id)?;
            if meta.status.is_terminal() {
                return Ok(meta);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TaskError::WaitTimeout(task_id.to_string()));
            }
            thread::sleep(poll_interval.min(deadline - now));
        }
    }

    /// Removes tasks started at or before `days` ago; returns the removed ids, sorted.
    ///
    /// Each task leaves the manifest as soon as its directory is gone, so a failure
    /// partway through never strands entries for deleted tasks.
    pub fn cleanup_tasks(&self, days: u64, force: bool) -> Result<Vec<String>, TaskError> {
        let cutoff = Utc::now() - ChronoDuration::days(days.min(MAX_CLEANUP_DAYS) as i64);
        let mut removed = BTreeSet::new();

        for task_id in self.task_ids()? {
            let meta = match self.get_status(&task_id) {
                Ok(Some(meta)) => meta,
                Ok(None) => {
                    debug!(task_id = %task_id, "no meta.json; leaving in place");
                    continue;
                }
                Err(err) => {
                    warn!(task_id = %task_id, "skipping unreadable task: {err}");
                    continue;
                }
            };
            let Some(started) = meta.started_at_utc() else {
                debug!(task_id = %task_id, started_at = %meta.started_at, "unparsable start time");
                continue;
            };
            if days > 0 && started > cutoff {
                continue;
            }
            if meta.status == TaskStatus::Running {
                if !force {
                    debug!(task_id = %task_id, "still running; use force to remove");
                    continue;
                }
                self.kill_task(&task_id)?;
            }

            self.remove_task(&task_id)?;
            removed.insert(task_id);
        }

        if !removed.is_empty() {
            info!(count = removed.len(), "cleaned up tasks");
        }
        Ok(removed.into_iter().collect())
    }

    fn remove_task(&self, task_id: &str) -> Result<(), TaskError> {
        let dir = self.task_dir(task_id);
        fs::remove_dir_all(&dir).map_err(TaskError::io(&dir))?;
        self.update_manifest(|manifest| {
            manifest.tasks.remove(task_id);
        })
    }
}
