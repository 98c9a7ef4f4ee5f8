//! Command-line interface for tasks-tracker
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is defined in its own submodule.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::Result;
use crate::events::ProfileType;
use crate::task::TaskType;

mod context;
mod replay;
mod tasks;
mod transfer;

/// tasks-tracker - task completion tracking for the game client
///
/// Replays host events through a tracker session, and reads or edits the
/// saved task data of one account profile offline.
#[derive(Parser, Debug)]
#[command(name = "tasks-tracker")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub globals: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to tasks-tracker.toml (defaults to the one in the store directory)
    #[arg(long, global = true, env = "TASKS_TRACKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Saved data directory
    #[arg(long, global = true, env = "TASKS_TRACKER_STORE")]
    pub store: Option<PathBuf>,

    /// Directory holding <task type>.json definition files
    #[arg(long, global = true, env = "TASKS_TRACKER_DEFINITIONS")]
    pub definitions: Option<PathBuf>,

    /// Profile type whose saved data is used (standard, beta, deadman, ...)
    #[arg(long, global = true)]
    pub profile: Option<ProfileType>,

    /// Account name whose saved data is used
    #[arg(long, global = true, env = "TASKS_TRACKER_ACCOUNT")]
    pub account: Option<String>,

    /// Task type to operate on (combat, league3, league4)
    #[arg(long, global = true)]
    pub task_type: Option<TaskType>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay recorded host events and print the resulting host actions
    Replay {
        /// JSON lines file of host records, or - for stdin
        input: PathBuf,

        /// Write host actions to this file instead of stdout
        #[arg(long)]
        actions: Option<PathBuf>,
    },

    /// Print saved task data in the web tracker's import format
    Export {
        /// Dump every task type instead of the selected one
        #[arg(long)]
        all: bool,
    },

    /// Overwrite tracked/completed flags from a web tracker export
    Import {
        /// JSON document, or - for stdin
        input: PathBuf,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show task counts and points for the selected task type
    Summary,

    /// Toggle whether a task is tracked
    Track {
        /// Task id
        id: u32,
    },
}

impl Cli {
    /// Whether host actions are streamed to stdout, which rules out a JSON
    /// envelope on the same stream.
    pub fn writes_actions_to_stdout(&self) -> bool {
        matches!(self.command, Commands::Replay { actions: None, .. })
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let context = context::Context::resolve(&self.globals)?;
        match self.command {
            Commands::Replay { input, actions } => replay::run(
                &context,
                replay::ReplayOptions {
                    input,
                    actions,
                },
            ),
            Commands::Export { all } => transfer::run_export(&context, all),
            Commands::Import { input, yes } => transfer::run_import(&context, &input, yes),
            Commands::Summary => tasks::run_summary(&context),
            Commands::Track { id } => tasks::run_track(&context, id),
        }
    }
}
