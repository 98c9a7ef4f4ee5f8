//! Import/export interchange documents.
//!
//! Export produces either a single task type document (what the web tracker
//! imports) or a diagnostic dump of every task type. Import reads the web
//! tracker's `{"tasks": {"<id>": {...}}}` shape and overwrites flags for the
//! ids the registry knows.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::events::{ProfileType, VarpSource};
use crate::task::{Task, TaskRegistry, TaskType};
use crate::varps::VarpDecoder;

/// Where users paste exported data.
pub const OS_LEAGUE_TOOLS_IMPORT_URL: &str =
    "https://www.osleague.tools/tracker?open=import&tab=tasks";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedTask {
    pub id: u32,
    pub name: String,
    pub points: u32,
    pub tracked: bool,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl From<&Task> for ExportedTask {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id(),
            name: task.name().to_string(),
            points: task.points(),
            tracked: task.tracked(),
            completed: task.completed(),
            category: task.definition().category.clone(),
        }
    }
}

/// Full export of one task type plus environment metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTypeExport {
    pub plugin_version: String,
    pub client_version: String,
    pub task_type: TaskType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_type: Option<ProfileType>,
    pub timestamp: DateTime<Utc>,
    /// Raw varp values backing this task type, keyed by varp id.
    #[serde(default)]
    pub varps: BTreeMap<u32, i32>,
    pub tasks: BTreeMap<String, ExportedTask>,
}

/// Tasks of one type without environment metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCollectionExport {
    pub task_type: TaskType,
    pub tasks: BTreeMap<String, ExportedTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExportDocument {
    One(TaskTypeExport),
    All(BTreeMap<TaskType, TaskCollectionExport>),
}

impl ExportDocument {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Environment hints stamped on single task type exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportContext<'a> {
    pub client_version: &'a str,
    pub account: Option<&'a str>,
    pub profile: Option<ProfileType>,
}

fn tasks_by_id(registry: &TaskRegistry, task_type: TaskType) -> BTreeMap<String, ExportedTask> {
    registry
        .manager(task_type)
        .tasks()
        .map(|task| (task.id().to_string(), ExportedTask::from(task)))
        .collect()
}

pub fn export_one(
    registry: &TaskRegistry,
    task_type: TaskType,
    context: ExportContext<'_>,
    varps: BTreeMap<u32, i32>,
) -> TaskTypeExport {
    TaskTypeExport {
        plugin_version: env!("CARGO_PKG_VERSION").to_string(),
        client_version: context.client_version.to_string(),
        task_type,
        display_name: context.account.map(str::to_string),
        profile_type: context.profile,
        timestamp: Utc::now(),
        varps,
        tasks: tasks_by_id(registry, task_type),
    }
}

pub fn export_all(registry: &TaskRegistry) -> BTreeMap<TaskType, TaskCollectionExport> {
    TaskType::ALL
        .into_iter()
        .map(|task_type| {
            (
                task_type,
                TaskCollectionExport {
                    task_type,
                    tasks: tasks_by_id(registry, task_type),
                },
            )
        })
        .collect()
}

/// `Some(task_type)` exports that type with metadata; `None` dumps every type.
pub fn export(
    registry: &TaskRegistry,
    task_type: Option<TaskType>,
    context: ExportContext<'_>,
    decoder: &VarpDecoder,
    client: &dyn VarpSource,
) -> ExportDocument {
    match task_type {
        Some(task_type) => {
            let varps = decoder
                .mapping(task_type)
                .map(|mapping| {
                    mapping
                        .varp_ids()
                        .iter()
                        .map(|varp_id| (*varp_id, client.varp_value(*varp_id)))
                        .collect()
                })
                .unwrap_or_default();
            ExportDocument::One(export_one(registry, task_type, context, varps))
        }
        None => ExportDocument::All(export_all(registry)),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Number(f64),
}

/// Accepts booleans, or timestamps where any positive value means set.
fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<FlagValue>::deserialize(deserializer)? {
        None => false,
        Some(FlagValue::Bool(value)) => value,
        Some(FlagValue::Number(value)) => value > 0.0,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ImportedTask {
    #[serde(default, alias = "todo", deserialize_with = "flag")]
    pub tracked: bool,
    #[serde(default, deserialize_with = "flag")]
    pub completed: bool,
}

/// The external tracker's export shape. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExternalImport {
    #[serde(default)]
    pub tasks: BTreeMap<u32, ImportedTask>,
}

impl ExternalImport {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Blank input and unparseable input fail differently; neither touches state.
pub fn parse_import(input: &str) -> Result<ExternalImport> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyImportInput);
    }
    serde_json::from_str(trimmed).map_err(|err| Error::MalformedImportDocument(err.to_string()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub applied: usize,
    pub ignored: usize,
}

/// Overwrite both flags for every imported id the registry knows.
pub fn apply_import(
    registry: &mut TaskRegistry,
    task_type: TaskType,
    import: &ExternalImport,
) -> ImportReport {
    let manager = registry.manager_mut(task_type);
    let mut report = ImportReport::default();
    for (id, imported) in &import.tasks {
        match manager.get_mut(*id) {
            Some(task) => {
                task.set_tracked(imported.tracked);
                task.set_completed(imported.completed);
                report.applied += 1;
            }
            None => report.ignored += 1,
        }
    }
    report
}
