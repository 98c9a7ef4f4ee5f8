//! tasks-tracker replay command implementation
//!
//! Drives a tracker session from a JSON lines recording. Each line is either
//! a host event (`{"event": ...}`) or a control record (`{"record": ...}`)
//! standing in for the client: setting a varp value, a game tick at a given
//! offset, or a user action from the panel.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::events::{ActionSink, HostAction, HostEvent, RefreshScope};
use crate::output::{emit_success, HumanOutput};
use crate::session::{import_failure_action, LoginState, TrackerSession};
use crate::task::TaskType;

use super::context::{read_input, Context};

/// Options for the replay command
pub(crate) struct ReplayOptions {
    pub input: PathBuf,
    pub actions: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayRecord {
    Event(HostEvent),
    Control(ControlRecord),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum ControlRecord {
    VarpSet {
        varp_id: u32,
        value: i32,
    },
    Tick {
        at_ms: u64,
    },
    ToggleTracked {
        #[serde(default)]
        task_type: Option<TaskType>,
        id: u32,
    },
    Export {
        #[serde(default)]
        task_type: Option<TaskType>,
    },
    Import {
        document: String,
        #[serde(default = "default_accept")]
        accept: bool,
    },
    Totals,
}

fn default_accept() -> bool {
    true
}

#[derive(Debug, Default, Serialize)]
struct ReplayReport {
    records: usize,
    events: usize,
    ticks: usize,
    actions: usize,
    login_state: Option<LoginState>,
    pending_varps: usize,
}

pub(crate) fn run(context: &Context, options: ReplayOptions) -> Result<()> {
    let text = read_input(&options.input)?;
    let mut sink = match &options.actions {
        Some(path) => ActionSink::file(path)?,
        None => ActionSink::stdout(),
    };

    let mut session = context.open_session()?;
    let mut client: BTreeMap<u32, i32> = BTreeMap::new();
    let mut report = ReplayReport::default();
    let started = Instant::now();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record: ReplayRecord = serde_json::from_str(line).map_err(|err| {
            Error::InvalidArgument(format!("line {}: {err}", index + 1))
        })?;
        report.records += 1;

        let actions = match record {
            ReplayRecord::Event(event) => {
                report.events += 1;
                session.handle(event, &client)
            }
            ReplayRecord::Control(control) => {
                apply_control(&mut session, &mut client, control, started, &mut report)?
            }
        };
        report.actions += actions.len();
        sink.emit_all(&actions)?;
    }

    report.login_state = Some(session.login_state());
    report.pending_varps = session.throttler().pending().len();
    let actions = session.shutdown(&client);
    report.actions += actions.len();
    sink.emit_all(&actions)?;

    tracing::info!(
        records = report.records,
        actions = report.actions,
        "replay finished"
    );

    if options.actions.is_none() {
        return Ok(());
    }

    let mut human = HumanOutput::new("tasks-tracker replay: done");
    human.push_summary("records", report.records.to_string());
    human.push_summary("ticks", report.ticks.to_string());
    human.push_summary("actions", report.actions.to_string());
    if report.pending_varps > 0 {
        human.push_warning(format!(
            "{} varp updates were still pending at the end",
            report.pending_varps
        ));
    }
    emit_success(context.output, "replay", &report, Some(&human))
}

fn apply_control(
    session: &mut TrackerSession,
    client: &mut BTreeMap<u32, i32>,
    control: ControlRecord,
    started: Instant,
    report: &mut ReplayReport,
) -> Result<Vec<HostAction>> {
    let actions = match control {
        ControlRecord::VarpSet { varp_id, value } => {
            client.insert(varp_id, value);
            Vec::new()
        }
        ControlRecord::Tick { at_ms } => {
            report.ticks += 1;
            session.tick(started + Duration::from_millis(at_ms), &*client)
        }
        ControlRecord::ToggleTracked { task_type, id } => {
            let task_type = task_type.unwrap_or_else(|| session.selected_task_type());
            session.toggle_tracked(task_type, id)?;
            vec![HostAction::Refresh {
                scope: RefreshScope::Task { task_type, id },
            }]
        }
        ControlRecord::Export { task_type } => {
            let task_type = task_type.unwrap_or_else(|| session.selected_task_type());
            session.copy_export_to_clipboard(task_type, &*client)?
        }
        ControlRecord::Import { document, accept } => match session.begin_import(&document) {
            Ok(pending) => {
                let mut actions = vec![pending.confirmation()];
                if session.finish_import(pending, accept)?.is_some() {
                    actions.push(HostAction::refresh_all());
                }
                actions
            }
            Err(err) => vec![import_failure_action(&err)],
        },
        ControlRecord::Totals => vec![session.totals_chat_message()],
    };
    Ok(actions)
}
