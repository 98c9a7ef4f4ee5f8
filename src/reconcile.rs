//! Reconcile observed completion flags into the task registry.
//!
//! Every entry is applied on its own; no id's outcome depends on another, so
//! batch iteration order never matters. Callers persist once per batch when
//! [`BatchOutcome::is_changed`] is true.

use std::collections::{BTreeMap, BTreeSet};

use crate::task::{TaskRegistry, TaskType};

/// Result of reconciling one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Changed,
    Unchanged,
    TaskNotFound,
}

/// Result of reconciling a decoded varp or any other id -> completed map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub changed: BTreeSet<u32>,
    pub missing: BTreeSet<u32>,
}

impl BatchOutcome {
    pub fn is_changed(&self) -> bool {
        !self.changed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciler {
    untrack_upon_completion: bool,
}

impl Reconciler {
    pub fn new(untrack_upon_completion: bool) -> Self {
        Self {
            untrack_upon_completion,
        }
    }

    pub fn untrack_upon_completion(&self) -> bool {
        self.untrack_upon_completion
    }

    pub fn set_untrack_upon_completion(&mut self, enabled: bool) {
        self.untrack_upon_completion = enabled;
    }

    pub fn apply(
        &self,
        registry: &mut TaskRegistry,
        task_type: TaskType,
        id: u32,
        completed: bool,
    ) -> ApplyOutcome {
        let Some(task) = registry.manager_mut(task_type).get_mut(id) else {
            return ApplyOutcome::TaskNotFound;
        };

        let mut changed = task.set_completed(completed);
        if completed && self.untrack_upon_completion {
            changed |= task.set_tracked(false);
        }

        if changed {
            ApplyOutcome::Changed
        } else {
            ApplyOutcome::Unchanged
        }
    }

    pub fn apply_batch(
        &self,
        registry: &mut TaskRegistry,
        task_type: TaskType,
        completion: &BTreeMap<u32, bool>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (id, completed) in completion {
            match self.apply(registry, task_type, *id, *completed) {
                ApplyOutcome::Changed => {
                    outcome.changed.insert(*id);
                }
                ApplyOutcome::Unchanged => {}
                ApplyOutcome::TaskNotFound => {
                    outcome.missing.insert(*id);
                }
            }
        }
        if !outcome.missing.is_empty() {
            tracing::trace!(
                task_type = %task_type,
                missing = outcome.missing.len(),
                "decoded ids without a task definition"
            );
        }
        outcome
    }
}
