//! Shared setup for CLI commands: config, store and session.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{TrackerConfig, CONFIG_FILE_NAME};
use crate::error::{Error, Result};
use crate::events::{ProfileType, VarpSource};
use crate::output::OutputOptions;
use crate::session::{HostInfo, TrackerSession};
use crate::storage::{ConfigStore, FileConfigStore, TrackerDataStore};
use crate::task::{JsonTaskSource, Task, TaskRegistry, TaskType};
use crate::varps::{encode_window, VarpDecoder, VarpMapping};

use super::GlobalArgs;

pub(crate) struct Context {
    pub config: TrackerConfig,
    pub store_root: PathBuf,
    pub definitions_dir: PathBuf,
    pub profile: Option<ProfileType>,
    pub account: Option<String>,
    pub output: OutputOptions,
}

impl Context {
    pub fn resolve(globals: &GlobalArgs) -> Result<Self> {
        let default_root = match &globals.store {
            Some(dir) => dir.clone(),
            None => FileConfigStore::default_root().ok_or_else(|| {
                Error::OperationFailed(
                    "no home directory found; pass --store <dir>".to_string(),
                )
            })?,
        };

        let mut config = match &globals.config {
            Some(path) => TrackerConfig::load(path)?,
            None => TrackerConfig::load_from_dir(&default_root),
        };
        if let Some(task_type) = globals.task_type {
            config.task_type = task_type;
        }

        let store_root = match (&globals.store, &config.storage.dir) {
            (Some(dir), _) => dir.clone(),
            (None, Some(dir)) => dir.clone(),
            (None, None) => default_root,
        };
        let definitions_dir = globals
            .definitions
            .clone()
            .or_else(|| config.definitions.dir.clone())
            .unwrap_or_else(|| store_root.join("definitions"));

        tracing::debug!(
            store = %store_root.display(),
            definitions = %definitions_dir.display(),
            config = %store_root.join(CONFIG_FILE_NAME).display(),
            "resolved cli context"
        );

        Ok(Self {
            config,
            store_root,
            definitions_dir,
            profile: globals.profile,
            account: globals.account.clone(),
            output: OutputOptions {
                json: globals.json,
                quiet: globals.quiet,
            },
        })
    }

    pub fn task_type(&self) -> TaskType {
        self.config.task_type
    }

    /// A session that has not seen any login yet.
    pub fn open_session(&self) -> Result<TrackerSession> {
        let store: Arc<dyn ConfigStore> = Arc::new(FileConfigStore::new(&self.store_root));
        let data = if self.config.storage.deferred_writes {
            TrackerDataStore::deferred(store)?
        } else {
            TrackerDataStore::new(store)
        };
        let source = JsonTaskSource::new(&self.definitions_dir);
        let mut session = TrackerSession::start(
            self.config.clone(),
            &source,
            data,
            HostInfo {
                client_version: format!("cli-{}", env!("CARGO_PKG_VERSION")),
            },
        );
        if self.account.is_some() || self.profile.is_some() {
            session.set_identity(self.account.clone(), self.profile.unwrap_or_default());
        }
        Ok(session)
    }

    /// A session with the saved data of `--account`/`--profile` loaded.
    pub fn open_offline_session(&self) -> Result<TrackerSession> {
        let mut session = self.open_session()?;
        session.set_identity(self.account.clone(), self.profile.unwrap_or_default());
        let unreadable = session.load_saved_data();
        if !unreadable.is_empty() {
            return Err(Error::OperationFailed(format!(
                "saved data for {} could not be read",
                unreadable
                    .iter()
                    .map(|task_type| task_type.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(session)
    }
}

/// Read a file, or stdin for `-`.
pub(crate) fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Stand-in for the game client when none is running.
pub(crate) struct NoClient;

impl VarpSource for NoClient {
    fn varp_value(&self, _varp_id: u32) -> i32 {
        0
    }
}

/// Varp values rebuilt from saved completion flags, for exports made
/// without a running client.
pub(crate) struct SavedVarps<'a> {
    registry: &'a TaskRegistry,
    task_type: TaskType,
    mapping: VarpMapping,
}

impl<'a> SavedVarps<'a> {
    pub fn new(registry: &'a TaskRegistry, decoder: &VarpDecoder, task_type: TaskType) -> Self {
        let mapping = decoder
            .mapping(task_type)
            .cloned()
            .unwrap_or_else(|| VarpMapping::new(task_type, &[]));
        Self {
            registry,
            task_type,
            mapping,
        }
    }
}

impl VarpSource for SavedVarps<'_> {
    fn varp_value(&self, varp_id: u32) -> i32 {
        match self.mapping.ordinal(varp_id) {
            Some(ordinal) => encode_window(ordinal, |id| {
                self.registry
                    .get(self.task_type, id)
                    .is_some_and(Task::completed)
            }),
            None => 0,
        }
    }
}
