use crate::config::BgTaskConfig;
use crate::error::TaskError;
use ait_core::{validate_task_id, Manifest, TaskMeta, TaskResult, TaskSummary};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TASKS_DIR_NAME: &str = ".background_tasks";
pub const ROOT_ENV: &str = "BG_TASK_DIR";

const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_LOCK_FILE: &str = "manifest.lock";
const META_FILE: &str = "meta.json";
const PID_FILE: &str = "pid";
const COMMAND_PID_FILE: &str = "command.pid";
const LOG_FILE: &str = "stdout.log";
const RESULT_FILE: &str = "result.json";
const RUNNER_LOG_FILE: &str = "runner.log";

/// On-disk home of all background tasks: one directory per task plus the manifest.
#[derive(Debug, Clone)]
pub struct TaskStore {
    root: PathBuf,
    config: BgTaskConfig,
}

impl TaskStore {
    /// Opens (and creates) a store rooted at `root`, loading its config.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, TaskError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(TaskError::io(&root))?;
        let config = BgTaskConfig::load(&root);
        Ok(Self { root, config })
    }

    /// Resolves the store from `BG_TASK_DIR`, else `<git toplevel>/.background_tasks`.
    pub fn discover() -> Result<Self, TaskError> {
        if let Some(root) = std::env::var_os(ROOT_ENV).filter(|value| !value.is_empty()) {
            return Self::open(PathBuf::from(root));
        }
        Self::open(ait_core::git::toplevel().join(TASKS_DIR_NAME))
    }

    pub fn with_config(mut self, config: BgTaskConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_runner(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.runner_program = Some(program.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &BgTaskConfig {
        &self.config
    }

    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.root.join(task_id)
    }

    pub fn meta_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(META_FILE)
    }

    pub fn pid_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(PID_FILE)
    }

    /// Pid of the supervised command, which leads its own process group.
    pub fn command_pid_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(COMMAND_PID_FILE)
    }

    pub fn log_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(LOG_FILE)
    }

    pub fn result_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(RESULT_FILE)
    }

    pub fn runner_log_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(RUNNER_LOG_FILE)
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn load_manifest(&self) -> Result<Manifest, TaskError> {
        Ok(read_json(&self.manifest_path())?.unwrap_or_default())
    }

    pub fn save_manifest(&self, manifest: &Manifest) -> Result<(), TaskError> {
        write_json_atomic(&self.manifest_path(), manifest)
    }

    /// Read-modify-write of the manifest under an exclusive advisory lock.
    pub fn update_manifest<T>(
        &self,
        mutator: impl FnOnce(&mut Manifest) -> T,
    ) -> Result<T, TaskError> {
        let _guard = ManifestLock::acquire(&self.root.join(MANIFEST_LOCK_FILE))?;
        let mut manifest = self.load_manifest()?;
        let out = mutator(&mut manifest);
        self.save_manifest(&manifest)?;
        Ok(out)
    }

    pub(crate) fn record_summary(&self, meta: &TaskMeta) -> Result<(), TaskError> {
        let summary = TaskSummary::from(meta);
        self.update_manifest(|manifest| {
            manifest.tasks.insert(meta.task_id.clone(), summary);
        })
    }

    pub fn read_meta(&self, task_id: &str) -> Result<Option<TaskMeta>, TaskError> {
        validate_task_id(task_id)?;
        read_json(&self.meta_path(task_id))
    }

    pub fn write_meta(&self, meta: &TaskMeta) -> Result<(), TaskError> {
        validate_task_id(&meta.task_id)?;
        write_json_atomic(&self.meta_path(&meta.task_id), meta)
    }

    /// Persists `meta.json` and mirrors it into the manifest.
    pub(crate) fn persist(&self, meta: &TaskMeta) -> Result<(), TaskError> {
        self.write_meta(meta)?;
        self.record_summary(meta)
    }

    pub fn read_pid(&self, task_id: &str) -> Result<Option<u32>, TaskError> {
        read_pid_file(&self.pid_path(task_id))
    }

    pub fn write_pid(&self, task_id: &str, pid: u32) -> Result<(), TaskError> {
        write_pid_file(&self.pid_path(task_id), pid)
    }

    pub fn read_command_pid(&self, task_id: &str) -> Result<Option<u32>, TaskError> {
        read_pid_file(&self.command_pid_path(task_id))
    }

    pub fn write_command_pid(&self, task_id: &str, pid: u32) -> Result<(), TaskError> {
        write_pid_file(&self.command_pid_path(task_id), pid)
    }

    pub fn read_result(&self, task_id: &str) -> Result<Option<TaskResult>, TaskError> {
        read_json(&self.result_path(task_id))
    }

    pub fn write_result(&self, task_id: &str, result: &TaskResult) -> Result<(), TaskError> {
        write_json_atomic(&self.result_path(task_id), result)
    }

    /// Names of every task directory, sorted; files such as the manifest are ignored.
    pub fn task_ids(&self) -> Result<Vec<String>, TaskError> {
        let entries = fs::read_dir(&self.root).map_err(TaskError::io(&self.root))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(TaskError::io(&self.root))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if validate_task_id(&name).is_err() {
                debug!(dir = %name, "skipping non-task directory");
                continue;
            }
            ids.push(name);
        }
        ids.sort();
        Ok(ids)
    }
}

struct ManifestLock {
    file: File,
}

impl ManifestLock {
    fn acquire(path: &Path) -> Result<Self, TaskError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(TaskError::io(path))?;
        file.lock_exclusive().map_err(TaskError::io(path))?;
        Ok(Self { file })
    }
}

impl Drop for ManifestLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn read_pid_file(path: &Path) -> Result<Option<u32>, TaskError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.trim().parse::<u32>().ok()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(TaskError::io(path)(err)),
    }
}

fn write_pid_file(path: &Path, pid: u32) -> Result<(), TaskError> {
    fs::write(path, format!("{pid}\n")).map_err(TaskError::io(path))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, TaskError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(TaskError::io(path)(err)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(TaskError::json(path))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(TaskError::io(parent))?;
    }
    let payload = serde_json::to_string_pretty(value).map_err(TaskError::json(path))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload).map_err(TaskError::io(&tmp_path))?;
    fs::rename(&tmp_path, path).map_err(TaskError::io(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ait_core::TaskStatus;

    fn store() -> (tempfile::TempDir, TaskStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TaskStore::open(dir.path().join(TASKS_DIR_NAME)).expect("open store");
        (dir, store)
    }

    #[test]
    fn missing_manifest_loads_empty() {
        let (_dir, store) = store();
        assert_eq!(store.load_manifest().expect("load"), Manifest::default());
        let raw = serde_json::to_value(Manifest::default()).expect("serialize");
        assert_eq!(raw, serde_json::json!({"tasks": {}}));
    }

    #[test]
    fn update_manifest_persists_entries() {
        let (_dir, store) = store();
        let mut meta = TaskMeta::new("test", vec!["true".to_string()], 10);
        meta.started_at = "2024-01-01T00:00:00+00:00".to_string();
        store.record_summary(&meta).expect("record");

        let loaded = store.load_manifest().expect("load");
        assert_eq!(loaded.tasks["test"].status, TaskStatus::Running);

        let removed = store
            .update_manifest(|manifest| manifest.tasks.remove("test").is_some())
            .expect("update");
        assert!(removed);
        assert!(store.load_manifest().expect("reload").tasks.is_empty());
    }

    #[test]
    fn concurrent_summaries_all_survive() {
        const WRITERS: usize = 16;
        let (_dir, store) = store();
        std::thread::scope(|scope| {
            for n in 0..WRITERS {
                let store = &store;
                scope.spawn(move || {
                    let meta = TaskMeta::new(format!("task-{n}"), vec!["true".to_string()], 10);
                    store.record_summary(&meta).expect("record");
                });
            }
        });

        let manifest = store.load_manifest().expect("load");
        assert_eq!(manifest.tasks.len(), WRITERS);
        for n in 0..WRITERS {
            assert!(manifest.tasks.contains_key(&format!("task-{n}")));
        }
    }

    #[test]
    fn corrupt_manifest_is_an_error() {
        let (_dir, store) = store();
        fs::write(store.root().join(MANIFEST_FILE), "{").expect("write");
        assert!(matches!(store.load_manifest(), Err(TaskError::Json { .. })));
    }

    #[test]
    fn meta_round_trips_through_task_dir() {
        let (_dir, store) = store();
        let mut meta = TaskMeta::new("my-task", vec!["echo".to_string(), "hi".to_string()], 30);
        meta.started_at = "2024-01-01T00:00:00+00:00".to_string();
        store.write_meta(&meta).expect("write meta");
        store.write_pid("my-task", 4321).expect("write pid");

        let dir_name = store.task_dir("my-task");
        assert_eq!(dir_name.file_name().and_then(|n| n.to_str()), Some("my-task"));
        assert_eq!(store.read_meta("my-task").expect("read"), Some(meta));
        assert_eq!(store.read_pid("my-task").expect("read pid"), Some(4321));
        assert_eq!(store.read_result("my-task").expect("read result"), None);
        assert_eq!(store.task_ids().expect("ids"), vec!["my-task".to_string()]);
    }

    #[test]
    fn rejects_traversal_ids() {
        let (_dir, store) = store();
        assert!(matches!(store.read_meta("../x"), Err(TaskError::Contract(_))));
    }
}
