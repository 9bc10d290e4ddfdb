//! Error types for taskdb
//!
//! Provides structured error types with context for better debugging
//! and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for taskdb operations
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Schema Errors
    // ==========================================================================
    #[error("Entity '{entity}' declares no table name")]
    MissingTableName { entity: &'static str },

    #[error("Entity '{entity}' has no column-marked fields")]
    NoColumns { entity: &'static str },

    #[error("Field '{field}' of '{entity}' has unsupported type {rust_type}")]
    UnsupportedType {
        entity: &'static str,
        field: &'static str,
        rust_type: &'static str,
    },

    #[error("Column '{column}' is declared twice on table '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error("Table '{table}' has no primary key")]
    MissingPrimaryKey { table: String },

    #[error("Table '{table}' is not registered")]
    UnknownTable { table: String },

    // ==========================================================================
    // Dependency Errors
    // ==========================================================================
    #[error("Foreign key cycle between tables: {}", .path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    // ==========================================================================
    // Builder Errors
    // ==========================================================================
    #[error("Invalid statement: {0}")]
    Build(#[from] taskql::BuildError),

    #[error("{operation} needs an entity instance")]
    NoEntity { operation: &'static str },

    #[error("Primary key '{column}' of '{table}' is null")]
    NullPrimaryKey { table: String, column: String },

    #[error("Cannot alter table '{table}': {reason}")]
    UnsupportedAlter { table: String, reason: String },

    // ==========================================================================
    // Validation Errors
    // ==========================================================================
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Reserved name '{name}' cannot be used")]
    ReservedName { name: String },

    // ==========================================================================
    // Execution Errors
    // ==========================================================================
    #[error("Statement failed: {sql}: {source}")]
    Execution {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // ==========================================================================
    // Mapping Errors
    // ==========================================================================
    #[error("Error mapping row to {entity}: column '{column}': {message}")]
    Mapping {
        entity: &'static str,
        column: String,
        message: String,
    },

    // ==========================================================================
    // Session Errors
    // ==========================================================================
    #[error("Session is {state}, not ready")]
    SessionNotReady { state: &'static str },

    #[error("Failed to back up database to '{path}': {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to restore database from '{path}': {source}")]
    Restore {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    // ==========================================================================
    // Config Errors
    // ==========================================================================
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    // ==========================================================================
    // IO Errors
    // ==========================================================================
    #[error("Failed to read file '{path}': {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ==========================================================================
    // Serialization Errors
    // ==========================================================================
    #[error("Failed to parse YAML: {message}")]
    YamlParseError { message: String },

    #[error("Failed to parse DDL: {message}")]
    DdlParseError { message: String },
}

/// Result type alias for taskdb operations
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Conversions from external error types
// =============================================================================

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::YamlParseError {
            message: err.to_string(),
        }
    }
}

impl From<taskql::ParseError> for Error {
    fn from(err: taskql::ParseError) -> Self {
        Error::DdlParseError {
            message: err.to_string(),
        }
    }
}

impl From<crate::validation::ValidationError> for Error {
    fn from(err: crate::validation::ValidationError) -> Self {
        match err {
            crate::validation::ValidationError::InvalidIdentifier(value, reason) => {
                Error::InvalidIdentifier {
                    kind: "identifier",
                    value,
                    reason,
                }
            }
            crate::validation::ValidationError::TooLong(value, _max) => Error::InvalidIdentifier {
                kind: "identifier",
                value,
                reason: "exceeds maximum length",
            },
            crate::validation::ValidationError::Empty => Error::InvalidIdentifier {
                kind: "identifier",
                value: String::new(),
                reason: "cannot be empty",
            },
            crate::validation::ValidationError::Reserved(name) => Error::ReservedName { name },
        }
    }
}

// =============================================================================
// Error Display Helpers
// =============================================================================

impl Error {
    /// Returns a user-friendly suggestion for fixing the error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::DependencyCycle { .. } => {
                Some("Break the cycle by making one of the references nullable and creating it in a later ALTER")
            }
            Error::UnsupportedType { .. } => {
                Some("Use text, integer, real, boolean, UUID, enum, duration or date-time fields")
            }
            Error::MissingPrimaryKey { .. } => {
                Some("Mark one column with Column::primary_key() to use by_id()")
            }
            Error::Build(taskql::BuildError::MissingWhere { .. }) => {
                Some("Add a condition with where_() or call by_id()")
            }
            Error::InvalidIdentifier { .. } => {
                Some("Use only letters, numbers and underscores, starting with a letter")
            }
            Error::SessionNotReady { .. } => Some("Open the session with Session::open first"),
            _ => None,
        }
    }

    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Build(_)
                | Error::NoEntity { .. }
                | Error::NullPrimaryKey { .. }
                | Error::Execution { .. }
                | Error::Mapping { .. }
                | Error::UnsupportedAlter { .. }
        )
    }
}
