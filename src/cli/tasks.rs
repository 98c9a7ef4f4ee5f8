//! tasks-tracker summary and track commands

use serde::Serialize;

use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::task::{TaskType, TasksSummary};

use super::context::{Context, NoClient};

#[derive(Serialize)]
struct SummaryReport {
    task_type: TaskType,
    scope: String,
    #[serde(flatten)]
    summary: TasksSummary,
}

pub(crate) fn run_summary(context: &Context) -> Result<()> {
    let session = context.open_offline_session()?;
    let task_type = context.task_type();
    let summary = session.summary(task_type);
    let scope = session.scope().to_string();

    let mut human = HumanOutput::new(format!(
        "tasks-tracker summary: {}",
        task_type.display_string()
    ));
    human.push_summary("profile", scope.clone());
    human.push_summary("tasks", summary.total_tasks.to_string());
    human.push_summary(
        "completed",
        format!(
            "{} ({} points)",
            summary.completed_tasks_count, summary.completed_tasks_points
        ),
    );
    human.push_summary(
        "tracked",
        format!(
            "{} ({} points)",
            summary.tracked_tasks_count, summary.tracked_tasks_points
        ),
    );
    if summary.total_tasks == 0 {
        human.push_warning(format!(
            "no {} definitions found in {}",
            task_type.display_string(),
            context.definitions_dir.display()
        ));
        human.push_next_step("pass --definitions <dir>");
    }

    let report = SummaryReport {
        task_type,
        scope,
        summary,
    };
    emit_success(context.output, "summary", &report, Some(&human))?;
    session.shutdown(&NoClient);
    Ok(())
}

#[derive(Serialize)]
struct TrackReport {
    task_type: TaskType,
    id: u32,
    name: String,
    tracked: bool,
}

pub(crate) fn run_track(context: &Context, id: u32) -> Result<()> {
    let mut session = context.open_offline_session()?;
    let task_type = context.task_type();
    let tracked = session.toggle_tracked(task_type, id)?;
    let name = session
        .registry()
        .get(task_type, id)
        .map(|task| task.name().to_string())
        .ok_or(Error::UnknownTaskId { task_type, id })?;

    let verb = if tracked { "tracking" } else { "stopped tracking" };
    let mut human = HumanOutput::new(format!("tasks-tracker track: {verb} {name}"));
    human.push_summary("task type", task_type.display_string());
    human.push_summary("id", id.to_string());
    human.push_summary("tracked", tracked.to_string());

    let report = TrackReport {
        task_type,
        id,
        name,
        tracked,
    };
    emit_success(context.output, "track", &report, Some(&human))?;
    session.shutdown(&NoClient);
    Ok(())
}
