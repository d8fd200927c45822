//! Error types for tempo
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown id, illegal transition)
//! - 3: Blocked by policy (dependency cycle)
//! - 4: Operation failed (I/O, persistence, corrupt or unknown history)

use std::path::PathBuf;
use thiserror::Error;

use crate::model::Status;

/// Exit codes for the tempo CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tempo operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Not a tempo directory: {0} (no .tempo found)")]
    NotInitialized(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Illegal status transition: {from} -> {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Policy blocks (exit code 3)
    #[error("Dependency {from} -> {to} would create a cycle")]
    Cycle { from: String, to: String },

    // Operation failures (exit code 4)
    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Corrupt event record at line {line}: {message}")]
    CorruptRecord { line: usize, message: String },

    #[error("Unknown event type/version: {kind} v{version}")]
    UnknownEvent { kind: String, version: u32 },

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
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::NotInitialized(_)
            | Error::InvalidArgument(_)
            | Error::Validation(_)
            | Error::InvalidTransition { .. }
            | Error::NotFound { .. }
            | Error::InvalidConfig(_) => exit_codes::USER_ERROR,

            // Policy blocks
            Error::Cycle { .. } => exit_codes::POLICY_BLOCKED,

            // Operation failures
            Error::Persistence(_)
            | Error::CorruptRecord { .. }
            | Error::UnknownEvent { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::InvalidTransition { from, to } => Some(serde_json::json!({
                "from": from,
                "to": to,
            })),
            Error::NotFound { kind, id } => Some(serde_json::json!({
                "kind": kind,
                "id": id,
            })),
            Error::Cycle { from, to } => Some(serde_json::json!({
                "from": from,
                "to": to,
            })),
            Error::CorruptRecord { line, .. } => Some(serde_json::json!({
                "line": line,
            })),
            Error::UnknownEvent { kind, version } => Some(serde_json::json!({
                "type": kind,
                "version": version,
            })),
            _ => None,
        }
    }
}

/// Result type alias for tempo operations
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
