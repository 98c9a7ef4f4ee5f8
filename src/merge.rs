//! Merge persisted task flags into freshly loaded task definitions.
//!
//! Saved flags win for every id present in both; definition fields (name,
//! points, category) always come from the fresh definitions. Saved ids with no
//! current definition are dropped. After a merge the normalized state is saved
//! straight back, so the stored blob always matches the current definition set.

use serde::Serialize;

use crate::error::Result;
use crate::storage::{PersistedSnapshot, ProfileScope, TrackerDataStore};
use crate::task::{TaskManager, TaskRegistry, TaskType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Saved entries applied to a current task.
    pub applied: usize,
    /// Saved entries without a current task.
    pub dropped: usize,
    /// Whether the merged state was written back.
    pub resaved: bool,
}

/// Overwrite `tracked`/`completed` from the snapshot where ids match.
pub fn apply_snapshot(manager: &mut TaskManager, snapshot: &PersistedSnapshot) -> MergeReport {
    let mut report = MergeReport::default();
    for (id, save) in &snapshot.tasks {
        match manager.get_mut(*id) {
            Some(task) => {
                task.set_tracked(save.tracked);
                task.set_completed(save.completed);
                report.applied += 1;
            }
            None => report.dropped += 1,
        }
    }
    report
}

/// How a stored snapshot is folded into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeMode {
    /// Clear in-memory flags before applying, so only saved state survives.
    pub reset_flags: bool,
    /// Write the merged state straight back.
    pub resave: bool,
}

impl Default for MergeMode {
    fn default() -> Self {
        Self {
            reset_flags: false,
            resave: true,
        }
    }
}

/// Read the saved snapshot for `task_type`, merge it, then re-save.
///
/// A blob that cannot be read or parsed is reported and left untouched; the
/// in-memory state stays as it was. Nothing is written while `task_type` has
/// no definitions.
pub fn load_and_merge(
    data: &TrackerDataStore,
    scope: &ProfileScope,
    registry: &mut TaskRegistry,
    task_type: TaskType,
) -> Result<MergeReport> {
    load_and_merge_with(data, scope, registry, task_type, MergeMode::default())
}

/// [`load_and_merge`] with explicit reset and re-save behavior. Flags are
/// only reset once the snapshot has been read successfully.
pub fn load_and_merge_with(
    data: &TrackerDataStore,
    scope: &ProfileScope,
    registry: &mut TaskRegistry,
    task_type: TaskType,
    mode: MergeMode,
) -> Result<MergeReport> {
    let snapshot = data.load_snapshot(scope, task_type)?;
    let manager = registry.manager_mut(task_type);
    if manager.is_empty() {
        // No definitions loaded; re-saving would wipe the stored flags.
        tracing::debug!(task_type = %task_type, "no task definitions; skipping merge");
        return Ok(MergeReport {
            dropped: snapshot.tasks.len(),
            ..MergeReport::default()
        });
    }
    if mode.reset_flags {
        manager.reset_flags();
    }
    let mut report = apply_snapshot(manager, &snapshot);
    if report.dropped > 0 {
        tracing::debug!(
            task_type = %task_type,
            dropped = report.dropped,
            "saved tasks no longer defined"
        );
    }
    if mode.resave {
        report.resaved = data.save_logged(scope, task_type, manager);
    }
    Ok(report)
}
