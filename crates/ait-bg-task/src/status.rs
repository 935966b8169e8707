use crate::error::TaskError;
use crate::process::is_process_alive;
use crate::store::TaskStore;
use ait_core::{now_timestamp, TaskMeta, TaskStatus};
use chrono::{Duration, Utc};
use tracing::debug;

/// A running record with no pid yet is given this long before it is declared dead;
/// it covers the gap between writing meta.json and recording the runner pid.
const LAUNCH_GRACE_SECS: i64 = 10;

impl TaskStore {
    /// Reconciles a task's recorded status with OS process liveness and persists any change.
    pub fn update_task_status(&self, task_id: &str) -> Result<TaskMeta, TaskError> {
        let meta = self
            .read_meta(task_id)?
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;
        self.resolve(meta)
    }

    pub fn get_status(&self, task_id: &str) -> Result<Option<TaskMeta>, TaskError> {
        match self.read_meta(task_id)? {
            Some(meta) => self.resolve(meta).map(Some),
            None => Ok(None),
        }
    }

    /// Tasks sorted newest first; only running ones unless `show_all`.
    pub fn list_tasks(&self, show_all: bool) -> Result<Vec<TaskMeta>, TaskError> {
        let mut tasks = Vec::new();
        for task_id in self.task_ids()? {
            let meta = match self.read_meta(&task_id) {
                Ok(Some(meta)) => meta,
                Ok(None) => {
                    debug!(task_id = %task_id, "no meta.json; skipping");
                    continue;
                }
                Err(err) => {
                    debug!(task_id = %task_id, "unreadable meta.json: {err}");
                    continue;
                }
            };
            let meta = self.resolve(meta)?;
            if show_all || meta.status == TaskStatus::Running {
                tasks.push(meta);
            }
        }
        tasks.sort_by(|a, b| {
            b.started_at_utc()
                .cmp(&a.started_at_utc())
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        Ok(tasks)
    }

    pub(crate) fn resolve(&self, mut meta: TaskMeta) -> Result<TaskMeta, TaskError> {
        if meta.status != TaskStatus::Running {
            return Ok(meta);
        }

        let pid = match meta.pid {
            Some(pid) => Some(pid),
            None => self.read_pid(&meta.task_id)?,
        };
        match pid {
            Some(pid) if is_process_alive(pid) => return Ok(meta),
            Some(_) => {}
            None if within_launch_grace(&meta) => return Ok(meta),
            None => {}
        }

        match self.read_result(&meta.task_id)? {
            Some(result) => {
                meta.status = if result.exit_code == Some(0) {
                    TaskStatus::Completed
                } else {
                    TaskStatus::Failed
                };
                meta.exit_code = result.exit_code;
                meta.finished_at = Some(result.finished_at.unwrap_or_else(now_timestamp));
            }
            None => {
                debug!(task_id = %meta.task_id, "runner gone without result.json");
                meta.status = TaskStatus::Failed;
                meta.finished_at = Some(now_timestamp());
            }
        }
        self.persist(&meta)?;
        Ok(meta)
    }
}

fn within_launch_grace(meta: &TaskMeta) -> bool {
    meta.started_at_utc()
        .map(|started| Utc::now() - started < Duration::seconds(LAUNCH_GRACE_SECS))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ait_core::TaskResult;

    fn store() -> (tempfile::TempDir, TaskStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TaskStore::open(dir.path()).expect("open store");
        (dir, store)
    }

    fn running_meta(task_id: &str, pid: Option<u32>) -> TaskMeta {
        let mut meta = TaskMeta::new(task_id, vec!["sleep".to_string(), "100".to_string()], 60);
        meta.description = "Test".to_string();
        meta.started_at = "2024-01-01T00:00:00+00:00".to_string();
        meta.pid = pid;
        meta
    }

    #[test]
    fn dead_process_without_result_is_failed() {
        let (_dir, store) = store();
        store
            .persist(&running_meta("dead-task", Some(999_999_999)))
            .expect("persist");

        let updated = store.update_task_status("dead-task").expect("update");
        assert_eq!(updated.status, TaskStatus::Failed);
        assert!(updated.finished_at.is_some());
        assert_eq!(updated.exit_code, None);
        assert_eq!(
            store.load_manifest().expect("manifest").tasks["dead-task"].status,
            TaskStatus::Failed
        );
    }

    #[test]
    fn dead_process_with_zero_exit_is_completed() {
        let (_dir, store) = store();
        store
            .persist(&running_meta("done", Some(999_999_999)))
            .expect("persist");
        store
            .write_result(
                "done",
                &TaskResult {
                    exit_code: Some(0),
                    finished_at: Some("2024-01-01T00:00:05+00:00".to_string()),
                    ..TaskResult::default()
                },
            )
            .expect("result");

        let updated = store.update_task_status("done").expect("update");
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.exit_code, Some(0));
        assert_eq!(updated.finished_at.as_deref(), Some("2024-01-01T00:00:05+00:00"));
    }

    #[test]
    fn nonzero_exit_is_failed_with_code() {
        let (_dir, store) = store();
        store
            .persist(&running_meta("boom", Some(999_999_999)))
            .expect("persist");
        store
            .write_result(
                "boom",
                &TaskResult {
                    exit_code: Some(3),
                    ..TaskResult::default()
                },
            )
            .expect("result");

        let updated = store.update_task_status("boom").expect("update");
        assert_eq!(updated.status, TaskStatus::Failed);
        assert_eq!(updated.exit_code, Some(3));
        assert!(updated.finished_at.is_some());
    }

    #[test]
    fn live_pid_stays_running() {
        let (_dir, store) = store();
        store
            .persist(&running_meta("live", Some(std::process::id())))
            .expect("persist");
        let meta = store.get_status("live").expect("status").expect("exists");
        assert_eq!(meta.status, TaskStatus::Running);
    }

    #[test]
    fn fresh_record_without_pid_is_still_launching() {
        let (_dir, store) = store();
        let mut meta = running_meta("launching", None);
        meta.started_at = now_timestamp();
        store.persist(&meta).expect("persist");
        assert_eq!(
            store.update_task_status("launching").expect("update").status,
            TaskStatus::Running
        );

        let stale = running_meta("stale", None);
        store.persist(&stale).expect("persist");
        assert_eq!(
            store.update_task_status("stale").expect("update").status,
            TaskStatus::Failed
        );
    }

    #[test]
    fn terminal_records_are_untouched() {
        let (_dir, store) = store();
        let mut meta = running_meta("killed", Some(std::process::id()));
        meta.status = TaskStatus::Killed;
        store.persist(&meta).expect("persist");
        assert_eq!(store.update_task_status("killed").expect("update"), meta);
    }

    #[test]
    fn unknown_task_is_not_found() {
        let (_dir, store) = store();
        assert!(store.get_status("nonexistent-task-12345").expect("status").is_none());
        assert!(matches!(
            store.update_task_status("nonexistent-task-12345"),
            Err(TaskError::NotFound(_))
        ));
    }

    #[test]
    fn list_filters_running_and_sorts_newest_first() {
        let (_dir, store) = store();
        let mut older = running_meta("older", Some(std::process::id()));
        older.started_at = "2024-01-01T00:00:00+00:00".to_string();
        let mut newer = running_meta("newer", Some(std::process::id()));
        newer.started_at = "2024-02-01T00:00:00+00:00".to_string();
        let mut finished = running_meta("finished", None);
        finished.status = TaskStatus::Completed;
        for meta in [&older, &newer, &finished] {
            store.persist(meta).expect("persist");
        }
        std::fs::create_dir_all(store.task_dir("no-meta")).expect("mkdir");

        let running: Vec<_> = store
            .list_tasks(false)
            .expect("list")
            .into_iter()
            .map(|meta| meta.task_id)
            .collect();
        assert_eq!(running, vec!["newer".to_string(), "older".to_string()]);

        let all = store.list_tasks(true).expect("list all");
        assert_eq!(all.len(), 3);
    }
}
