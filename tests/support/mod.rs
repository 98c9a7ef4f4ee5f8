#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tasks_tracker::config::TrackerConfig;
use tasks_tracker::events::{GameState, HostEvent, ProfileType};
use tasks_tracker::session::{HostInfo, TrackerSession};
use tasks_tracker::storage::{
    ConfigStore, MemoryConfigStore, PersistedSnapshot, ProfileScope, TrackerDataStore,
};
use tasks_tracker::task::{StaticTaskSource, TaskDefinition, TaskType};
use tasks_tracker::varps::{VarpDecoder, VarpMapping};
use tasks_tracker::{Error, Result};
use tempfile::TempDir;

/// Combat varps used by the small test decoder.
pub const COMBAT_VARPS: [u32; 3] = [9001, 9002, 9003];
/// League 4 varps used by the small test decoder.
pub const LEAGUE_VARPS: [u32; 2] = [7001, 7002];

/// Definitions for ids `0..count`, named "Task <id>" and worth `id % 5 + 1`.
pub fn definitions(count: u32) -> Vec<TaskDefinition> {
    (0..count)
        .map(|id| TaskDefinition::new(id, format!("Task {id}"), id % 5 + 1))
        .collect()
}

pub fn source() -> StaticTaskSource {
    StaticTaskSource::new()
        .with(TaskType::Combat, definitions(96))
        .with(TaskType::League4, definitions(64))
        .with(TaskType::League3, definitions(10))
}

pub fn decoder() -> VarpDecoder {
    VarpDecoder::new(vec![
        VarpMapping::new(TaskType::Combat, &COMBAT_VARPS),
        VarpMapping::new(TaskType::League4, &LEAGUE_VARPS),
    ])
}

pub fn config(task_type: TaskType) -> TrackerConfig {
    TrackerConfig {
        task_type,
        ..TrackerConfig::default()
    }
}

/// Session over an in-memory store with synchronous saves.
pub struct Harness {
    pub store: Arc<MemoryConfigStore>,
    pub session: TrackerSession,
    pub client: HashMap<u32, i32>,
    pub start: Instant,
}

impl Harness {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryConfigStore::new()))
    }

    pub fn with_store(config: TrackerConfig, store: Arc<MemoryConfigStore>) -> Self {
        let dyn_store: Arc<dyn ConfigStore> = store.clone();
        Self::with_config_store(config, store, dyn_store)
    }

    /// Session over `config_store`; `store` is the memory store it ends up in.
    pub fn with_config_store(
        config: TrackerConfig,
        store: Arc<MemoryConfigStore>,
        config_store: Arc<dyn ConfigStore>,
    ) -> Self {
        let session = TrackerSession::start(
            config,
            &source(),
            TrackerDataStore::new(config_store),
            HostInfo {
                client_version: "test-client".to_string(),
            },
        )
        .with_decoder(decoder());
        Self {
            store,
            session,
            client: HashMap::new(),
            start: Instant::now(),
        }
    }

    pub fn at(&self, ms: u64) -> Instant {
        self.start + std::time::Duration::from_millis(ms)
    }

    pub fn event(&mut self, event: HostEvent) -> Vec<tasks_tracker::events::HostAction> {
        self.session.handle(event, &self.client)
    }

    pub fn tick(&mut self, ms: u64) -> Vec<tasks_tracker::events::HostAction> {
        let now = self.at(ms);
        self.session.tick(now, &self.client)
    }

    pub fn game_state(&mut self, state: GameState) -> Vec<tasks_tracker::events::HostAction> {
        self.event(HostEvent::GameStateChanged {
            state,
            profile: ProfileType::Standard,
            account: None,
        })
    }

    /// LOGGING_IN then LOGGED_IN, then the tick that runs the force refresh.
    pub fn login(&mut self, ms: u64) -> Vec<tasks_tracker::events::HostAction> {
        self.game_state(GameState::LoggingIn);
        self.game_state(GameState::LoggedIn);
        self.tick(ms)
    }

    pub fn set_varp(&mut self, varp_id: u32, value: i32) {
        self.client.insert(varp_id, value);
    }

    pub fn change_varp(&mut self, varp_id: u32, value: i32) {
        self.set_varp(varp_id, value);
        self.event(HostEvent::VarpChanged { varp_id });
    }

    pub fn saved(&self, task_type: TaskType) -> Option<PersistedSnapshot> {
        saved_snapshot(&self.store, &ProfileScope::default(), task_type)
    }
}

/// Memory store whose reads fail while `fail_reads` is set, like a lock
/// held by another client.
pub struct FlakyReadStore {
    inner: Arc<MemoryConfigStore>,
    fail_reads: AtomicBool,
}

impl FlakyReadStore {
    pub fn new(inner: Arc<MemoryConfigStore>) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

impl ConfigStore for FlakyReadStore {
    fn get_blob(&self, scope: &ProfileScope, key: &str) -> Result<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::LockFailed(PathBuf::from(format!("{key}.json.lock"))));
        }
        self.inner.get_blob(scope, key)
    }

    fn set_blob(&self, scope: &ProfileScope, key: &str, data: &[u8]) -> Result<()> {
        self.inner.set_blob(scope, key, data)
    }
}

pub fn saved_snapshot(
    store: &MemoryConfigStore,
    scope: &ProfileScope,
    task_type: TaskType,
) -> Option<PersistedSnapshot> {
    store
        .get_blob(scope, task_type.name())
        .expect("read blob")
        .map(|data| serde_json::from_slice(&data).expect("snapshot json"))
}

pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// `definitions/<slug>.json` with `count` tasks for `task_type`.
    pub fn write_definitions(&self, task_type: TaskType, count: u32) -> std::io::Result<PathBuf> {
        let json = serde_json::to_string(&definitions(count)).expect("definitions json");
        self.write_file(&format!("definitions/{}.json", task_type.slug()), &json)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.dir.path().join("store")
    }

    pub fn definitions_dir(&self) -> PathBuf {
        self.dir.path().join("definitions")
    }
}
