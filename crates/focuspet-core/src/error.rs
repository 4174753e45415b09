//! Core error types for focuspet-core.
//!
//! This module defines the error hierarchy using thiserror. Command
//! rejections (`Conflict`, `Precondition`, `NoActiveTask`, `CheckInNotDue`)
//! never mutate state; storage errors are usually logged by the engine
//! instead of surfacing.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focuspet-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A task is already active.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A command's precondition does not hold.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A task-scoped command arrived while no task is active.
    #[error("No active task")]
    NoActiveTask,

    /// A check-in arrived outside the open check-in window.
    #[error("Check-in not accepted: next window opens at {due_at}")]
    CheckInNotDue { due_at: DateTime<Utc> },

    /// The async driver owning the engine is gone.
    #[error("Engine driver has stopped")]
    DriverStopped,

    /// Lookup by identifier failed
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) if e.code == rusqlite::ErrorCode::DatabaseLocked => {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_is_readable() {
        let err = CoreError::Conflict("task task-1 is already active".into());
        assert_eq!(err.to_string(), "Conflict: task task-1 is already active");
    }

    #[test]
    fn not_found_names_kind() {
        let err = CoreError::not_found("pet", "abc");
        assert_eq!(err.to_string(), "pet not found: abc");
    }

    #[test]
    fn sqlite_errors_convert_to_database_error() {
        let err: CoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, CoreError::Database(DatabaseError::QueryFailed(_))));
    }
}
