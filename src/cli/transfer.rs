//! tasks-tracker export and import commands

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::session::IMPORT_CONFIRM_MESSAGE;
use crate::task::TaskType;
use crate::transfer::OS_LEAGUE_TOOLS_IMPORT_URL;

use super::context::{read_input, Context, NoClient, SavedVarps};

pub(crate) fn run_export(context: &Context, all: bool) -> Result<()> {
    let session = context.open_offline_session()?;
    let document = if all {
        session.export(None, &NoClient)
    } else {
        let task_type = context.task_type();
        let varps = SavedVarps::new(session.registry(), session.decoder(), task_type);
        session.export(Some(task_type), &varps)
    };

    if context.output.json {
        emit_success(context.output, "export", &document, None)?;
    } else {
        println!("{}", document.to_json_pretty()?);
        if !context.output.quiet && !all {
            eprintln!("import it at {OS_LEAGUE_TOOLS_IMPORT_URL}");
        }
    }
    session.shutdown(&NoClient);
    Ok(())
}

#[derive(Serialize)]
struct ImportOutcome {
    task_type: TaskType,
    accepted: bool,
    applied: usize,
    ignored: usize,
}

pub(crate) fn run_import(context: &Context, input: &Path, yes: bool) -> Result<()> {
    let text = read_input(input)?;
    let mut session = context.open_offline_session()?;
    let pending = session.begin_import(&text)?;
    let task_type = pending.task_type();
    let entries = pending.import().len();

    let accepted = yes || confirm(input)?;
    let report = session.finish_import(pending, accepted)?;
    session.shutdown(&NoClient);

    let outcome = ImportOutcome {
        task_type,
        accepted,
        applied: report.map(|r| r.applied).unwrap_or(0),
        ignored: report.map(|r| r.ignored).unwrap_or(0),
    };

    let header = if accepted {
        format!("tasks-tracker import: {} updated", task_type.display_string())
    } else {
        "tasks-tracker import: cancelled".to_string()
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("entries", entries.to_string());
    if accepted {
        human.push_summary("applied", outcome.applied.to_string());
        human.push_summary("ignored", outcome.ignored.to_string());
        if outcome.ignored > 0 {
            human.push_warning(format!(
                "{} entries have no {} task definition",
                outcome.ignored,
                task_type.display_string()
            ));
        }
    } else {
        human.push_next_step("rerun with --yes to import without prompting");
    }

    emit_success(context.output, "import", &outcome, Some(&human))
}

fn confirm(input: &Path) -> Result<bool> {
    if input.as_os_str() == "-" {
        return Err(Error::InvalidArgument(
            "--yes is required when the document is read from stdin".to_string(),
        ));
    }
    eprint!("{IMPORT_CONFIRM_MESSAGE} [y/N] ");
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
