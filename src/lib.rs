//! tasks-tracker - Task Completion Tracking Library
//!
//! The core of a game-client plugin that mirrors the server's per-task
//! completion bits into a local task list, lets the player mark tasks as
//! tracked, persists both flags per account profile, and trades data with an
//! external web tracker.
//!
//! # Core Concepts
//!
//! - **Task types**: independent task lists (combat achievements, leagues)
//! - **Varps**: 32-bit client variables, each packing the completion bits of
//!   32 consecutive task ids
//! - **Throttled sync**: varp changes collect between flushes; a login or
//!   profile switch forces a full refresh
//! - **Profiles**: saved flags are scoped by account and profile type
//!
//! # Module Organization
//!
//! - `task`: task definitions, per-type managers and the registry
//! - `varps`: varp id tables and bit decoding
//! - `reconcile`: applying decoded completion to the registry
//! - `throttle`: pending varp set, flush window and force-refresh flag
//! - `storage`: profile-scoped blob store and saved snapshots
//! - `lock`: file locking and atomic writes for the file store
//! - `merge`: restoring saved flags into fresh definitions
//! - `transfer`: export documents and external import
//! - `events`: host events, host actions and the event queue
//! - `session`: the session tying all of the above together
//! - `config`: configuration loading from `tasks-tracker.toml`
//! - `error`: error types and result aliases
//! - `output`: CLI output envelopes
//! - `cli`: command-line interface using clap

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod lock;
pub mod merge;
pub mod output;
pub mod reconcile;
pub mod session;
pub mod storage;
pub mod task;
pub mod throttle;
pub mod transfer;
pub mod varps;

pub use error::{Error, Result};
pub use session::{HostInfo, TrackerSession};
