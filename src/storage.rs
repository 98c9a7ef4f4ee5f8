//! Persistence for tasks-tracker
//!
//! The core only needs whole-blob reads and writes, scoped by profile and
//! keyed by task type name. [`ConfigStore`] is that seam; the host plugs in
//! its own store, or uses [`FileConfigStore`]:
//!
//! ```text
//! <store root>/
//!   <account>.<profile>/        # one directory per profile scope
//!     COMBAT.json               # {"<id>": {"tracked": bool, "completed": bool}, ...}
//!     LEAGUE_3.json
//!     LEAGUE_4.json
//!     LEAGUE_4.json.lock        # fs2 lock file guarding the blob
//! ```
//!
//! [`TrackerDataStore`] turns task managers into [`PersistedSnapshot`] blobs.
//! With deferred writes enabled, saves are handed to a background writer
//! thread so a slow disk never stalls the tick loop.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::events::ProfileType;
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};
use crate::task::{TaskManager, TaskType};

/// Scope under which blobs are stored: one per account and profile type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProfileScope(String);

impl ProfileScope {
    pub fn new(account: Option<&str>, profile: ProfileType) -> Self {
        let account = account
            .map(str::trim)
            .filter(|account| !account.is_empty())
            .unwrap_or("default");
        Self(format!("{}.{}", account, profile.key()))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe form of the scope name.
    pub fn dir_name(&self) -> String {
        let mut key = String::with_capacity(self.0.len());
        for ch in self.0.chars() {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                key.push(ch);
            } else {
                key.push('_');
            }
        }
        if key.is_empty() || key.chars().all(|ch| ch == '.') {
            "_".to_string()
        } else {
            key
        }
    }
}

impl Default for ProfileScope {
    fn default() -> Self {
        Self::new(None, ProfileType::Standard)
    }
}

impl fmt::Display for ProfileScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Profile-scoped key/value blob store provided by the host.
pub trait ConfigStore: Send + Sync {
    fn get_blob(&self, scope: &ProfileScope, key: &str) -> Result<Option<Vec<u8>>>;
    fn set_blob(&self, scope: &ProfileScope, key: &str, data: &[u8]) -> Result<()>;
}

/// Blobs as JSON files under a root directory.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    root: PathBuf,
    lock_timeout_ms: u64,
}

impl FileConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    /// Platform data directory, e.g. `~/.local/share/tasks-tracker` on Linux.
    pub fn default_root() -> Option<PathBuf> {
        directories::ProjectDirs::from("net", "reldo", "tasks-tracker")
            .map(|dirs| dirs.data_dir().to_path_buf())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blob_path(&self, scope: &ProfileScope, key: &str) -> PathBuf {
        self.root
            .join(scope.dir_name())
            .join(format!("{}.json", ProfileScope::named(key).dir_name()))
    }
}

impl ConfigStore for FileConfigStore {
    fn get_blob(&self, scope: &ProfileScope, key: &str) -> Result<Option<Vec<u8>>> {
        lock::read_locked(self.blob_path(scope, key), self.lock_timeout_ms)
    }

    fn set_blob(&self, scope: &ProfileScope, key: &str, data: &[u8]) -> Result<()> {
        lock::write_atomic_locked(self.blob_path(scope, key), data, self.lock_timeout_ms)
    }
}

/// In-memory store; counts writes so callers can observe save batching.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    blobs: Mutex<HashMap<(ProfileScope, String), Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn blobs(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(ProfileScope, String), Vec<u8>>>> {
        self.blobs
            .lock()
            .map_err(|_| Error::OperationFailed("memory store lock poisoned".to_string()))
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_blob(&self, scope: &ProfileScope, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs()?.get(&(scope.clone(), key.to_string())).cloned())
    }

    fn set_blob(&self, scope: &ProfileScope, key: &str, data: &[u8]) -> Result<()> {
        self.blobs()?
            .insert((scope.clone(), key.to_string()), data.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Minimal saved state for one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSave {
    #[serde(default)]
    pub tracked: bool,
    #[serde(default)]
    pub completed: bool,
}

/// Saved flags for one task type, keyed by task id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedSnapshot {
    pub tasks: BTreeMap<u32, TaskSave>,
}

impl PersistedSnapshot {
    pub fn from_manager(manager: &TaskManager) -> Self {
        Self {
            tasks: manager
                .tasks()
                .map(|task| {
                    (
                        task.id(),
                        TaskSave {
                            tracked: task.tracked(),
                            completed: task.completed(),
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Config key under which a task type's snapshot is stored.
pub fn config_key(task_type: TaskType) -> &'static str {
    task_type.name()
}

fn encode_snapshot(
    scope: &ProfileScope,
    task_type: TaskType,
    manager: &TaskManager,
) -> Result<Vec<u8>> {
    let snapshot = PersistedSnapshot::from_manager(manager);
    tracing::debug!(
        scope = %scope,
        key = config_key(task_type),
        tasks = snapshot.tasks.len(),
        "saving task data"
    );
    Ok(serde_json::to_vec(&snapshot)?)
}

enum WriteJob {
    Write {
        scope: ProfileScope,
        key: String,
        data: Vec<u8>,
    },
    Flush(mpsc::Sender<()>),
}

/// Single background thread applying writes in submission order.
struct BackgroundWriter {
    sender: Option<mpsc::Sender<WriteJob>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundWriter {
    fn spawn(store: Arc<dyn ConfigStore>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<WriteJob>();
        let handle = std::thread::Builder::new()
            .name("tasks-tracker-writer".to_string())
            .spawn(move || {
                for job in receiver {
                    match job {
                        WriteJob::Write { scope, key, data } => {
                            if let Err(err) = store.set_blob(&scope, &key, &data) {
                                tracing::warn!(scope = %scope, key = %key, error = %err, "deferred save failed");
                            }
                        }
                        WriteJob::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
            })?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    fn submit(&self, job: WriteJob) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or_else(|| Error::OperationFailed("writer stopped".to_string()))?
            .send(job)
            .map_err(|_| Error::OperationFailed("writer thread exited".to_string()))
    }

    /// Block until every write submitted so far has been applied.
    fn flush(&self) -> Result<()> {
        let (ack, done) = mpsc::channel();
        self.submit(WriteJob::Flush(ack))?;
        done.recv()
            .map_err(|_| Error::OperationFailed("writer thread exited".to_string()))
    }
}

impl Drop for BackgroundWriter {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Loads and saves [`PersistedSnapshot`]s through a [`ConfigStore`].
pub struct TrackerDataStore {
    store: Arc<dyn ConfigStore>,
    writer: Option<BackgroundWriter>,
}

impl TrackerDataStore {
    /// Saves complete before `save` returns.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            writer: None,
        }
    }

    /// Saves are queued to a background writer thread.
    pub fn deferred(store: Arc<dyn ConfigStore>) -> Result<Self> {
        let writer = BackgroundWriter::spawn(Arc::clone(&store))?;
        Ok(Self {
            store,
            writer: Some(writer),
        })
    }

    pub fn is_deferred(&self) -> bool {
        self.writer.is_some()
    }

    /// Absent blob is an empty snapshot. Queued writes land before the read.
    pub fn load_snapshot(
        &self,
        scope: &ProfileScope,
        task_type: TaskType,
    ) -> Result<PersistedSnapshot> {
        self.flush()?;
        match self.store.get_blob(scope, config_key(task_type))? {
            None => Ok(PersistedSnapshot::default()),
            Some(data) if data.iter().all(u8::is_ascii_whitespace) => {
                Ok(PersistedSnapshot::default())
            }
            Some(data) => Ok(serde_json::from_slice(&data)?),
        }
    }

    /// Save through the background writer when deferred. A deferred save
    /// only reports whether the job was queued.
    pub fn save(
        &self,
        scope: &ProfileScope,
        task_type: TaskType,
        manager: &TaskManager,
    ) -> Result<()> {
        let data = encode_snapshot(scope, task_type, manager)?;
        let key = config_key(task_type);
        match &self.writer {
            Some(writer) => writer.submit(WriteJob::Write {
                scope: scope.clone(),
                key: key.to_string(),
                data,
            }),
            None => self.write_blob(scope, key, &data),
        }
    }

    /// Save synchronously and report the store's result, even when writes
    /// are deferred. Queued writes land first so they cannot overwrite it.
    pub fn save_now(
        &self,
        scope: &ProfileScope,
        task_type: TaskType,
        manager: &TaskManager,
    ) -> Result<()> {
        let data = encode_snapshot(scope, task_type, manager)?;
        self.flush()?;
        self.write_blob(scope, config_key(task_type), &data)
    }

    fn write_blob(&self, scope: &ProfileScope, key: &str, data: &[u8]) -> Result<()> {
        self.store
            .set_blob(scope, key, data)
            .map_err(|err| Error::PersistenceWrite {
                key: key.to_string(),
                message: err.to_string(),
            })
    }

    /// Save, logging instead of propagating failure. Returns whether it succeeded.
    pub fn save_logged(
        &self,
        scope: &ProfileScope,
        task_type: TaskType,
        manager: &TaskManager,
    ) -> bool {
        match self.save(scope, task_type, manager) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(scope = %scope, task_type = %task_type, error = %err, "failed to save task data");
                false
            }
        }
    }

    /// Wait for queued background writes; no-op for synchronous stores.
    pub fn flush(&self) -> Result<()> {
        match &self.writer {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}
