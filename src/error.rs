//! Error types for tasks-tracker
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, bad config, unknown task type)
//! - 3: Import rejected (empty or malformed import input)
//! - 4: Operation failed (I/O, persistence, serialization)
//!
//! Inside the sync pipeline most of these are contained: an unresolved varp
//! or an unknown task id is logged and skipped, a failed save is logged and
//! retried on the next natural save. Only user-initiated import/export and
//! CLI operations surface errors to the caller.

use std::path::PathBuf;
use thiserror::Error;

use crate::task::TaskType;

/// Exit codes for the tasks-tracker CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const IMPORT_REJECTED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tasks-tracker operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Varp {0} does not belong to any task type")]
    UnresolvedSource(u32),

    #[error("Task {id} not found in {task_type}")]
    UnknownTaskId { task_type: TaskType, id: u32 },

    // Import rejections (exit code 3)
    #[error("Input was empty so no data has been imported.")]
    EmptyImportInput,

    #[error("There was an issue importing task tracker data. {0}")]
    MalformedImportDocument(String),

    // Operation failures (exit code 4)
    #[error("Failed to load task definitions for {task_type}: {message}")]
    TaskDefinitions { task_type: TaskType, message: String },

    #[error("Failed to persist {key}: {message}")]
    PersistenceWrite { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::UnknownTaskType(_)
            | Error::UnresolvedSource(_)
            | Error::UnknownTaskId { .. } => exit_codes::USER_ERROR,

            Error::EmptyImportInput | Error::MalformedImportDocument(_) => {
                exit_codes::IMPORT_REJECTED
            }

            Error::TaskDefinitions { .. }
            | Error::PersistenceWrite { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Short machine-readable kind used in JSON error envelopes
    pub fn kind(&self) -> &'static str {
        match self.exit_code() {
            exit_codes::USER_ERROR => "user_error",
            exit_codes::IMPORT_REJECTED => "import_rejected",
            _ => "operation_failed",
        }
    }

    /// Structured details for JSON output, where the variant carries fields
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::UnknownTaskId { task_type, id } => Some(serde_json::json!({
                "task_type": task_type,
                "id": id,
            })),
            Error::UnresolvedSource(varp_id) => Some(serde_json::json!({ "varp_id": varp_id })),
            Error::TaskDefinitions { task_type, message } => Some(serde_json::json!({
                "task_type": task_type,
                "message": message,
            })),
            Error::PersistenceWrite { key, message } => Some(serde_json::json!({
                "key": key,
                "message": message,
            })),
            Error::InvalidConfig(message)
            | Error::InvalidArgument(message)
            | Error::MalformedImportDocument(message) => {
                Some(serde_json::json!({ "message": message }))
            }
            Error::LockFailed(path) => Some(serde_json::json!({ "path": path })),
            _ => None,
        }
    }
}

/// Result type alias for tasks-tracker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
