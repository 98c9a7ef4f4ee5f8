//! Task registry for tasks-tracker.
//!
//! Each [`TaskType`] owns one [`TaskManager`]: an ordered map from task id to
//! [`Task`]. Static [`TaskDefinition`]s come from a [`TaskSource`] and are
//! shared read-only; the `tracked`/`completed` flags are the only mutable state.
//!
//! Definition files are plain JSON arrays, one per task type:
//!
//! ```text
//! <definitions dir>/
//!   combat.json      # [{"id": 0, "name": "Noxious Foe", "points": 1, ...}, ...]
//!   league3.json
//!   league4.json
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Closed set of task collections tracked by the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskType {
    #[serde(rename = "COMBAT")]
    Combat,
    #[serde(rename = "LEAGUE_3")]
    League3,
    #[serde(rename = "LEAGUE_4")]
    League4,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [TaskType::Combat, TaskType::League3, TaskType::League4];

    /// Stable name, also used as the persisted config key.
    pub fn name(self) -> &'static str {
        match self {
            TaskType::Combat => "COMBAT",
            TaskType::League3 => "LEAGUE_3",
            TaskType::League4 => "LEAGUE_4",
        }
    }

    pub fn display_string(self) -> &'static str {
        match self {
            TaskType::Combat => "Combat Tasks",
            TaskType::League3 => "League III: Shattered Relics",
            TaskType::League4 => "League IV: Trailblazer Reloaded",
        }
    }

    /// File stem for definition files.
    pub fn slug(self) -> &'static str {
        match self {
            TaskType::Combat => "combat",
            TaskType::League3 => "league3",
            TaskType::League4 => "league4",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-' && !ch.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        TaskType::ALL
            .into_iter()
            .find(|task_type| task_type.slug() == normalized)
            .ok_or_else(|| Error::UnknownTaskType(s.to_string()))
    }
}

/// Static metadata for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

impl TaskDefinition {
    pub fn new(id: u32, name: impl Into<String>, points: u32) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            points,
            category: None,
            tier: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A task definition plus the user/observed flags.
#[derive(Debug, Clone)]
pub struct Task {
    definition: Arc<TaskDefinition>,
    tracked: bool,
    completed: bool,
}

impl Task {
    pub fn new(definition: Arc<TaskDefinition>) -> Self {
        Self {
            definition,
            tracked: false,
            completed: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.definition.id
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn points(&self) -> u32 {
        self.definition.points
    }

    pub fn definition(&self) -> &TaskDefinition {
        &self.definition
    }

    pub fn tracked(&self) -> bool {
        self.tracked
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Returns true when the flag actually changed.
    pub fn set_tracked(&mut self, tracked: bool) -> bool {
        let changed = self.tracked != tracked;
        self.tracked = tracked;
        changed
    }

    /// Returns true when the flag actually changed.
    pub fn set_completed(&mut self, completed: bool) -> bool {
        let changed = self.completed != completed;
        self.completed = completed;
        changed
    }
}

/// Aggregate counts shown in the panel header and sent to chat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TasksSummary {
    pub total_tasks: usize,
    pub completed_tasks_count: usize,
    pub completed_tasks_points: u64,
    pub tracked_tasks_count: usize,
    pub tracked_tasks_points: u64,
}

/// Owns every task of a single [`TaskType`].
#[derive(Debug, Clone)]
pub struct TaskManager {
    task_type: TaskType,
    tasks: BTreeMap<u32, Task>,
}

impl TaskManager {
    pub fn new(task_type: TaskType) -> Self {
        Self {
            task_type,
            tasks: BTreeMap::new(),
        }
    }

    /// Build a manager with fresh flags. Duplicate ids keep the first definition.
    pub fn from_definitions(task_type: TaskType, definitions: Vec<TaskDefinition>) -> Self {
        let mut tasks = BTreeMap::new();
        for definition in definitions {
            let id = definition.id;
            if tasks.contains_key(&id) {
                tracing::warn!(task_type = %task_type, id, "duplicate task definition ignored");
                continue;
            }
            tasks.insert(id, Task::new(Arc::new(definition)));
        }
        Self { task_type, tasks }
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn get(&self, id: u32) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    /// Tasks in ascending id order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Case-insensitive lookup by display name.
    pub fn find_by_name(&self, name: &str) -> Option<u32> {
        let needle = name.trim();
        self.tasks
            .values()
            .find(|task| task.name().eq_ignore_ascii_case(needle))
            .map(Task::id)
    }

    /// Clear both flags on every task, as if freshly loaded.
    pub fn reset_flags(&mut self) {
        for task in self.tasks.values_mut() {
            task.set_tracked(false);
            task.set_completed(false);
        }
    }

    pub fn summary(&self) -> TasksSummary {
        self.tasks
            .values()
            .fold(TasksSummary::default(), |mut summary, task| {
                summary.total_tasks += 1;
                if task.completed() {
                    summary.completed_tasks_count += 1;
                    summary.completed_tasks_points += u64::from(task.points());
                }
                if task.tracked() {
                    summary.tracked_tasks_count += 1;
                    summary.tracked_tasks_points += u64::from(task.points());
                }
                summary
            })
    }
}

/// Supplier of static task definitions.
pub trait TaskSource {
    fn load_definitions(&self, task_type: TaskType) -> Result<Vec<TaskDefinition>>;
}

/// Reads `<dir>/<slug>.json` for each task type.
#[derive(Debug, Clone)]
pub struct JsonTaskSource {
    dir: PathBuf,
}

impl JsonTaskSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, task_type: TaskType) -> PathBuf {
        self.dir.join(format!("{}.json", task_type.slug()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TaskSource for JsonTaskSource {
    fn load_definitions(&self, task_type: TaskType) -> Result<Vec<TaskDefinition>> {
        let path = self.path_for(task_type);
        let content = fs::read_to_string(&path).map_err(|err| Error::TaskDefinitions {
            task_type,
            message: format!("{}: {err}", path.display()),
        })?;
        serde_json::from_str(&content).map_err(|err| Error::TaskDefinitions {
            task_type,
            message: format!("{}: {err}", path.display()),
        })
    }
}

/// In-memory definitions, mostly for embedding hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTaskSource {
    definitions: HashMap<TaskType, Vec<TaskDefinition>>,
}

impl StaticTaskSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, task_type: TaskType, definitions: Vec<TaskDefinition>) -> Self {
        self.definitions.insert(task_type, definitions);
        self
    }
}

impl TaskSource for StaticTaskSource {
    fn load_definitions(&self, task_type: TaskType) -> Result<Vec<TaskDefinition>> {
        Ok(self
            .definitions
            .get(&task_type)
            .cloned()
            .unwrap_or_default())
    }
}

/// One [`TaskManager`] per [`TaskType`], always all present.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    managers: [TaskManager; 3],
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            managers: TaskType::ALL.map(TaskManager::new),
        }
    }

    /// Load every task type; a failing source leaves that manager empty.
    pub fn load_all(source: &dyn TaskSource) -> Self {
        let mut registry = Self::new();
        for task_type in TaskType::ALL {
            if let Err(err) = registry.load(task_type, source) {
                tracing::warn!(task_type = %task_type, error = %err, "task definitions unavailable");
            }
        }
        registry
    }

    /// Replace the manager for `task_type` with freshly loaded definitions.
    ///
    /// In-memory flags are discarded; callers follow up with a snapshot merge.
    pub fn load(&mut self, task_type: TaskType, source: &dyn TaskSource) -> Result<&TaskManager> {
        let definitions = source.load_definitions(task_type)?;
        tracing::debug!(task_type = %task_type, count = definitions.len(), "loaded task definitions");
        self.managers[task_type.index()] = TaskManager::from_definitions(task_type, definitions);
        Ok(&self.managers[task_type.index()])
    }

    pub fn manager(&self, task_type: TaskType) -> &TaskManager {
        &self.managers[task_type.index()]
    }

    pub fn manager_mut(&mut self, task_type: TaskType) -> &mut TaskManager {
        &mut self.managers[task_type.index()]
    }

    pub fn get(&self, task_type: TaskType, id: u32) -> Option<&Task> {
        self.manager(task_type).get(id)
    }

    /// Read-only snapshot of the current tasks of one type.
    pub fn all(&self, task_type: TaskType) -> Vec<Task> {
        self.manager(task_type).tasks().cloned().collect()
    }

    pub fn managers(&self) -> impl Iterator<Item = &TaskManager> {
        self.managers.iter()
    }
}
