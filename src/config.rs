//! Configuration loading and management
//!
//! Handles parsing of `tasks-tracker.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::TaskType;

/// File name looked up inside the data directory
pub const CONFIG_FILE_NAME: &str = "tasks-tracker.toml";

const MAX_THROTTLE_DELAY_MS: u64 = 60 * 60 * 1000;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Task type shown in the panel and targeted by import/export
    #[serde(default = "default_task_type")]
    pub task_type: TaskType,

    /// Stop tracking a task once it is observed completed
    #[serde(default)]
    pub untrack_upon_completion: bool,

    /// Flush pending varp updates when the session shuts down
    #[serde(default)]
    pub flush_on_shutdown: bool,

    /// Varp update throttling
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Saved data location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Task definition files
    #[serde(default)]
    pub definitions: DefinitionsConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            task_type: default_task_type(),
            untrack_upon_completion: false,
            flush_on_shutdown: false,
            throttle: ThrottleConfig::default(),
            storage: StorageConfig::default(),
            definitions: DefinitionsConfig::default(),
        }
    }
}

fn default_task_type() -> TaskType {
    TaskType::League4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Minimum time between flushes of pending varp updates
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    7_000
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

impl ThrottleConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store root; defaults to the platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Hand saves to a background writer thread
    #[serde(default = "default_true")]
    pub deferred_writes: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: None,
            deferred_writes: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionsConfig {
    /// Directory holding `<slug>.json` definition files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl TrackerConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TrackerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `tasks-tracker.toml` from `dir`, or return defaults
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.throttle.delay_ms > MAX_THROTTLE_DELAY_MS {
            return Err(Error::InvalidConfig(format!(
                "throttle.delay_ms must be at most {MAX_THROTTLE_DELAY_MS}, got {}",
                self.throttle.delay_ms
            )));
        }
        Ok(())
    }
}
