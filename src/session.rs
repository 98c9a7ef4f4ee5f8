//! The tracker session: one owner for every piece of mutable state.
//!
//! A host adapter calls [`TrackerSession::handle`] for events it can deliver
//! on the owning thread, or pushes them through [`TrackerSession::sender`]
//! from elsewhere. [`TrackerSession::tick`] drains that queue, then runs at
//! most one of two sync paths:
//!
//! - a force refresh (after login or a profile switch): saved data for every
//!   task type is merged, every varp is decoded, and every task type is saved;
//! - a throttled flush of the varps that changed since the last flush.
//!
//! Both paths answer with [`HostAction`]s for the host to carry out.

use std::collections::BTreeSet;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::events::{
    DialogKind, EventQueue, EventSender, GameState, HostAction, HostEvent, ProfileType,
    RefreshScope, VarpSource,
};
use crate::merge::{self, MergeMode};
use crate::reconcile::{ApplyOutcome, BatchOutcome, Reconciler};
use crate::storage::{PersistedSnapshot, ProfileScope, TrackerDataStore};
use crate::task::{TaskRegistry, TaskSource, TaskType, TasksSummary};
use crate::throttle::UpdateThrottler;
use crate::transfer::{self, ExportContext, ExportDocument, ExternalImport, ImportReport};
use crate::varps::{varp_bits, VarpDecoder};

pub const IMPORT_ERROR_TITLE: &str = "Import Tasks Error";
pub const IMPORT_CONFIRM_TITLE: &str = "Import Tasks";
pub const IMPORT_CONFIRM_MESSAGE: &str = "Importing tasks will overwrite task tracker settings and cannot be undone. Are you sure you want to import tasks?";
pub const EXPORT_DIALOG_TITLE: &str = "Data Exported!";

/// Config keys the session reacts to.
pub mod config_keys {
    pub const UNTRACK_UPON_COMPLETION: &str = "untrackUponCompletion";
    pub const TASK_TYPE: &str = "taskType";
    pub const FILTER_PANEL_COLLAPSIBLE: &str = "filterPanelCollapsible";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostInfo {
    pub client_version: String,
}

impl Default for HostInfo {
    fn default() -> Self {
        Self {
            client_version: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginState {
    Uninitialized,
    LoggedOut,
    LoggingIn,
    LoggedIn,
    ProfileSwitch,
}

/// A parsed import waiting for the user's confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImport {
    task_type: TaskType,
    import: ExternalImport,
}

impl PendingImport {
    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn import(&self) -> &ExternalImport {
        &self.import
    }

    /// The yes/no question the host puts to the user.
    pub fn confirmation(&self) -> HostAction {
        HostAction::dialog(IMPORT_CONFIRM_TITLE, IMPORT_CONFIRM_MESSAGE, DialogKind::Warning)
    }
}

/// Error dialog for a rejected import.
pub fn import_failure_action(err: &Error) -> HostAction {
    HostAction::dialog(IMPORT_ERROR_TITLE, err.to_string(), DialogKind::Error)
}

pub struct TrackerSession {
    config: TrackerConfig,
    registry: TaskRegistry,
    decoder: VarpDecoder,
    reconciler: Reconciler,
    throttler: UpdateThrottler,
    data: TrackerDataStore,
    queue: EventQueue,
    login_state: LoginState,
    profile: Option<ProfileType>,
    account: Option<String>,
    host: HostInfo,
}

impl TrackerSession {
    /// Load every task type's definitions and wait for the host's first
    /// game state.
    pub fn start(
        config: TrackerConfig,
        source: &dyn TaskSource,
        data: TrackerDataStore,
        host: HostInfo,
    ) -> Self {
        let registry = TaskRegistry::load_all(source);
        info!(
            task_type = %config.task_type,
            deferred_writes = data.is_deferred(),
            "tasks tracker started"
        );
        Self {
            reconciler: Reconciler::new(config.untrack_upon_completion),
            throttler: UpdateThrottler::new(config.throttle.delay()),
            config,
            registry,
            decoder: VarpDecoder::builtin(),
            data,
            queue: EventQueue::new(),
            login_state: LoginState::Uninitialized,
            profile: None,
            account: None,
            host,
        }
    }

    /// Replace the builtin varp tables.
    pub fn with_decoder(mut self, decoder: VarpDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Handle for host adapters on other threads.
    pub fn sender(&self) -> EventSender {
        self.queue.sender()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn decoder(&self) -> &VarpDecoder {
        &self.decoder
    }

    pub fn throttler(&self) -> &UpdateThrottler {
        &self.throttler
    }

    pub fn login_state(&self) -> LoginState {
        self.login_state
    }

    pub fn selected_task_type(&self) -> TaskType {
        self.config.task_type
    }

    pub fn untrack_upon_completion(&self) -> bool {
        self.reconciler.untrack_upon_completion()
    }

    /// Where saved data for the current account and profile lives.
    pub fn scope(&self) -> ProfileScope {
        ProfileScope::new(self.account.as_deref(), self.profile.unwrap_or_default())
    }

    /// Set the identity without going through a login, for offline tools.
    pub fn set_identity(&mut self, account: Option<String>, profile: ProfileType) {
        self.account = account;
        self.profile = Some(profile);
    }

    pub fn summary(&self, task_type: TaskType) -> TasksSummary {
        self.registry.manager(task_type).summary()
    }

    /// Merge saved data for every task type into memory. Returns the task
    /// types whose saved data could not be read; those keep their in-memory
    /// flags.
    pub fn load_saved_data(&mut self) -> BTreeSet<TaskType> {
        self.merge_saved(MergeMode {
            reset_flags: true,
            resave: true,
        })
    }

    fn merge_saved(&mut self, mode: MergeMode) -> BTreeSet<TaskType> {
        let scope = self.scope();
        let mut unreadable = BTreeSet::new();
        for task_type in TaskType::ALL {
            match merge::load_and_merge_with(
                &self.data,
                &scope,
                &mut self.registry,
                task_type,
                mode,
            ) {
                Ok(report) => debug!(
                    scope = %scope,
                    task_type = %task_type,
                    applied = report.applied,
                    dropped = report.dropped,
                    "merged saved task data"
                ),
                Err(err) => {
                    warn!(
                        scope = %scope,
                        task_type = %task_type,
                        error = %err,
                        "saved task data unreadable; keeping in-memory flags"
                    );
                    unreadable.insert(task_type);
                }
            }
        }
        unreadable
    }

    /// Reload definitions from `source`, then restore saved flags. Flags held
    /// in memory carry over to the new definitions until saved data replaces
    /// them.
    pub fn reload_definitions(&mut self, source: &dyn TaskSource) -> Vec<HostAction> {
        for task_type in TaskType::ALL {
            let carried = PersistedSnapshot::from_manager(self.registry.manager(task_type));
            match self.registry.load(task_type, source) {
                Ok(_) => {
                    merge::apply_snapshot(self.registry.manager_mut(task_type), &carried);
                }
                Err(err) => {
                    warn!(task_type = %task_type, error = %err, "keeping previous task definitions");
                }
            }
        }
        self.load_saved_data();
        vec![HostAction::refresh_all()]
    }

    pub fn handle(&mut self, event: HostEvent, client: &dyn VarpSource) -> Vec<HostAction> {
        match event {
            HostEvent::VarpChanged { varp_id } => {
                if !self.throttler.notify(varp_id) {
                    debug!(varp_id, "varp change absorbed by pending force refresh");
                }
                Vec::new()
            }
            HostEvent::GameStateChanged {
                state,
                profile,
                account,
            } => self.on_game_state(state, profile, account),
            HostEvent::ConfigChanged { key, value } => {
                self.on_config_changed(&key, value.as_deref(), client)
            }
            HostEvent::ChatMessage { message } => self.on_chat_message(&message),
        }
    }

    /// Periodic sync. Queued events are handled first.
    pub fn tick(&mut self, now: Instant, client: &dyn VarpSource) -> Vec<HostAction> {
        let mut actions = Vec::new();
        for event in self.queue.drain() {
            actions.extend(self.handle(event, client));
        }

        if self.throttler.take_force_refresh(now) {
            actions.extend(self.force_refresh(client));
        } else if let Some(varp_ids) = self.throttler.drain_due(now) {
            actions.extend(self.flush(&varp_ids, client));
        }
        actions
    }

    fn on_game_state(
        &mut self,
        state: GameState,
        profile: ProfileType,
        account: Option<String>,
    ) -> Vec<HostAction> {
        let logged_in = state.is_logged_in();
        let previous_profile = self.profile;
        if account.is_some() {
            self.account = account;
        }

        if state == GameState::LoggingIn {
            self.login_state = LoginState::LoggingIn;
            self.throttler.request_force_refresh();
        } else if logged_in && previous_profile.is_some_and(|current| current != profile) {
            info!(from = ?previous_profile, to = ?profile, "profile switched");
            self.login_state = LoginState::ProfileSwitch;
            self.throttler.request_force_refresh();
        } else if logged_in
            && matches!(
                self.login_state,
                LoginState::Uninitialized | LoginState::LoggedOut
            )
        {
            // Started while already logged in.
            self.login_state = LoginState::LoggingIn;
            self.throttler.request_force_refresh();
        } else if state.is_logged_out() {
            let dropped = self.throttler.discard();
            if dropped > 0 {
                debug!(dropped, "discarded pending varp updates on logout");
            }
            self.login_state = LoginState::LoggedOut;
        } else if self.login_state == LoginState::Uninitialized {
            self.login_state = LoginState::LoggedOut;
        }

        self.profile = Some(profile);
        vec![HostAction::SetLoggedIn { logged_in }]
    }

    fn on_config_changed(
        &mut self,
        key: &str,
        value: Option<&str>,
        client: &dyn VarpSource,
    ) -> Vec<HostAction> {
        match key {
            config_keys::UNTRACK_UPON_COMPLETION => {
                let enabled = value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
                self.reconciler.set_untrack_upon_completion(enabled);
                self.config.untrack_upon_completion = enabled;
                if enabled && self.login_state == LoginState::LoggedIn {
                    return self.redecode_all(client);
                }
                Vec::new()
            }
            config_keys::TASK_TYPE => {
                match value.map(str::parse::<TaskType>) {
                    Some(Ok(task_type)) => {
                        info!(task_type = %task_type, "selected task type changed");
                        self.config.task_type = task_type;
                    }
                    Some(Err(err)) => warn!(error = %err, "ignoring task type change"),
                    None => warn!("task type change without a value"),
                }
                vec![HostAction::refresh_all()]
            }
            config_keys::FILTER_PANEL_COLLAPSIBLE => vec![HostAction::refresh_all()],
            _ => Vec::new(),
        }
    }

    fn on_chat_message(&mut self, message: &str) -> Vec<HostAction> {
        let Some(name) = completed_combat_task_name(message) else {
            return Vec::new();
        };
        let Some(id) = self.registry.manager(TaskType::Combat).find_by_name(&name) else {
            debug!(name, "completed combat task not in definitions");
            return Vec::new();
        };

        match self
            .reconciler
            .apply(&mut self.registry, TaskType::Combat, id, true)
        {
            ApplyOutcome::Changed => {
                self.save(TaskType::Combat);
                vec![HostAction::Refresh {
                    scope: RefreshScope::Task {
                        task_type: TaskType::Combat,
                        id,
                    },
                }]
            }
            ApplyOutcome::Unchanged | ApplyOutcome::TaskNotFound => Vec::new(),
        }
    }

    fn force_refresh(&mut self, client: &dyn VarpSource) -> Vec<HostAction> {
        info!(scope = %self.scope(), state = ?self.login_state, "force refresh");
        // Every readable type is saved below, so the merge skips its own write.
        let unreadable = self.merge_saved(MergeMode {
            reset_flags: true,
            resave: false,
        });
        let sources = self.decoder.all_sources();
        self.decode_sources(&sources, client);
        for task_type in TaskType::ALL {
            if !unreadable.contains(&task_type) {
                self.save(task_type);
            }
        }
        self.login_state = LoginState::LoggedIn;
        vec![HostAction::refresh_all()]
    }

    fn redecode_all(&mut self, client: &dyn VarpSource) -> Vec<HostAction> {
        let sources = self.decoder.all_sources();
        let changed = self.decode_sources(&sources, client);
        for task_type in &changed {
            self.save(*task_type);
        }
        vec![HostAction::refresh_all()]
    }

    fn flush(&mut self, varp_ids: &[u32], client: &dyn VarpSource) -> Vec<HostAction> {
        if varp_ids.is_empty() {
            return Vec::new();
        }
        debug!(count = varp_ids.len(), "flushing varp updates");

        let mut actions = Vec::new();
        let mut changed_types = BTreeSet::new();
        for varp_id in varp_ids {
            let Some((task_type, outcome)) = self.decode_and_apply(*varp_id, client) else {
                continue;
            };
            if outcome.is_changed() {
                changed_types.insert(task_type);
            }
            actions.extend(outcome.changed.iter().map(|id| HostAction::Refresh {
                scope: RefreshScope::Task {
                    task_type,
                    id: *id,
                },
            }));
        }
        for task_type in changed_types {
            self.save(task_type);
        }
        actions
    }

    /// Decode and apply each varp; returns the task types that changed.
    fn decode_sources(&mut self, varp_ids: &[u32], client: &dyn VarpSource) -> BTreeSet<TaskType> {
        varp_ids
            .iter()
            .filter_map(|varp_id| self.decode_and_apply(*varp_id, client))
            .filter(|(_, outcome)| outcome.is_changed())
            .map(|(task_type, _)| task_type)
            .collect()
    }

    fn decode_and_apply(
        &mut self,
        varp_id: u32,
        client: &dyn VarpSource,
    ) -> Option<(TaskType, BatchOutcome)> {
        let raw = varp_bits(client.varp_value(varp_id));
        match self.decoder.decode(varp_id, raw) {
            Ok(decoded) => {
                let outcome =
                    self.reconciler
                        .apply_batch(&mut self.registry, decoded.task_type, &decoded.completion);
                Some((decoded.task_type, outcome))
            }
            Err(err) => {
                warn!(varp_id, error = %err, "skipping varp");
                None
            }
        }
    }

    fn save(&self, task_type: TaskType) -> bool {
        let manager = self.registry.manager(task_type);
        if manager.is_empty() {
            return false;
        }
        self.data.save_logged(&self.scope(), task_type, manager)
    }

    /// Flip a task's tracked flag and persist before returning. Returns the
    /// new value.
    pub fn toggle_tracked(&mut self, task_type: TaskType, id: u32) -> Result<bool> {
        let task = self
            .registry
            .manager_mut(task_type)
            .get_mut(id)
            .ok_or(Error::UnknownTaskId { task_type, id })?;
        let tracked = !task.tracked();
        task.set_tracked(tracked);
        self.data
            .save_now(&self.scope(), task_type, self.registry.manager(task_type))?;
        Ok(tracked)
    }

    pub fn export(&self, task_type: Option<TaskType>, client: &dyn VarpSource) -> ExportDocument {
        let context = ExportContext {
            client_version: &self.host.client_version,
            account: self.account.as_deref(),
            profile: self.profile,
        };
        transfer::export(&self.registry, task_type, context, &self.decoder, client)
    }

    pub fn copy_export_to_clipboard(
        &self,
        task_type: TaskType,
        client: &dyn VarpSource,
    ) -> Result<Vec<HostAction>> {
        let text = self.export(Some(task_type), client).to_json()?;
        info!(task_type = %task_type, bytes = text.len(), "exported task data");
        Ok(vec![
            HostAction::CopyToClipboard { text },
            HostAction::ShowDialog {
                title: EXPORT_DIALOG_TITLE.to_string(),
                message: format!(
                    "Exported {} data copied to clipboard!",
                    task_type.display_string()
                ),
                kind: DialogKind::Information,
                link: Some(transfer::OS_LEAGUE_TOOLS_IMPORT_URL.to_string()),
            },
        ])
    }

    /// First half of an import: parse, but change nothing yet.
    pub fn begin_import(&self, input: &str) -> Result<PendingImport> {
        match transfer::parse_import(input) {
            Ok(import) => Ok(PendingImport {
                task_type: self.config.task_type,
                import,
            }),
            Err(err) => {
                error!(error = %err, "import rejected");
                Err(err)
            }
        }
    }

    /// Second half: apply and persist when accepted. `None` when declined.
    pub fn finish_import(
        &mut self,
        pending: PendingImport,
        accepted: bool,
    ) -> Result<Option<ImportReport>> {
        if !accepted {
            debug!("import declined");
            return Ok(None);
        }
        let task_type = pending.task_type;
        let report = transfer::apply_import(&mut self.registry, task_type, &pending.import);
        info!(
            task_type = %task_type,
            applied = report.applied,
            ignored = report.ignored,
            "imported task data"
        );
        self.data
            .save_now(&self.scope(), task_type, self.registry.manager(task_type))?;
        Ok(Some(report))
    }

    pub fn totals_chat_message(&self) -> HostAction {
        let summary = self.summary(self.config.task_type);
        HostAction::SendChatMessage {
            message: format!(
                "Task Tracker - Tracked Tasks: {} | Tracked Points: {}",
                summary.tracked_tasks_count, summary.tracked_tasks_points
            ),
        }
    }

    /// Drop pending varp updates, or flush them when configured to, and wait
    /// for queued saves.
    pub fn shutdown(mut self, client: &dyn VarpSource) -> Vec<HostAction> {
        let mut actions = Vec::new();
        if self.config.flush_on_shutdown {
            let varp_ids: Vec<u32> = self.throttler.pending().iter().copied().collect();
            self.throttler.discard();
            actions = self.flush(&varp_ids, client);
        } else {
            let dropped = self.throttler.discard();
            if dropped > 0 {
                info!(dropped, "dropping pending varp updates on shutdown");
            }
        }
        if let Err(err) = self.data.flush() {
            warn!(error = %err, "queued saves did not complete");
        }
        info!("tasks tracker stopped");
        actions
    }
}

/// Task name from a "you've completed a ... combat task: <name> (...)" message.
pub fn completed_combat_task_name(message: &str) -> Option<String> {
    let text = strip_tags(message);
    let lower = text.to_ascii_lowercase();
    if !lower.contains("you've completed") {
        return None;
    }
    const MARKER: &str = "combat task:";
    let start = lower.find(MARKER)? + MARKER.len();
    let rest = &text[start..];
    let rest = match rest.find(" (") {
        Some(end) => &rest[..end],
        None => rest,
    };
    let name = rest.trim().trim_end_matches('.').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn strip_tags(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut in_tag = false;
    for c in message.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
