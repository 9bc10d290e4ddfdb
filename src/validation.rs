//! Input validation for taskdb
//!
//! Table, column and index names are spliced into generated SQL, so they
//! must be plain SQL identifiers that need no quoting.

use thiserror::Error;

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid identifier '{0}': {1}")]
    InvalidIdentifier(String, &'static str),

    #[error("Identifier '{0}' is too long (max {1} characters)")]
    TooLong(String, usize),

    #[error("Identifier cannot be empty")]
    Empty,

    #[error("Reserved name: '{0}'")]
    Reserved(String),
}

/// Maximum length for identifiers
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// SQL keywords that would need quoting as bare identifiers
const RESERVED_NAMES: &[&str] = &[
    "add", "all", "alter", "and", "as", "between", "by", "case", "check", "column",
    "constraint", "create", "default", "delete", "distinct", "drop", "else", "exists",
    "foreign", "from", "group", "having", "in", "index", "insert", "into", "is", "join",
    "key", "like", "limit", "not", "null", "offset", "on", "or", "order", "primary",
    "references", "select", "set", "table", "then", "union", "unique", "update", "values",
    "when", "where",
];

/// Validate a table name
///
/// Rules:
/// - Must be 1-128 characters
/// - Only ASCII alphanumerics and underscore
/// - Must start with a letter
/// - Cannot be a SQL keyword (case-insensitive)
/// - Cannot use SQLite's internal `sqlite_` prefix
pub fn validate_table_name(name: &str) -> Result<(), ValidationError> {
    validate_identifier(name)?;
    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(ValidationError::InvalidIdentifier(
            name.to_string(),
            "the sqlite_ prefix is reserved",
        ));
    }
    Ok(())
}

/// Validate a column name
pub fn validate_column_name(name: &str) -> Result<(), ValidationError> {
    validate_identifier(name)
}

/// Validate an index name
pub fn validate_index_name(name: &str) -> Result<(), ValidationError> {
    validate_table_name(name)
}

/// Validate a column reference as used in projections and joins
///
/// Accepts `column` or `table.column`.
pub fn validate_column_ref(name: &str) -> Result<(), ValidationError> {
    match name.split_once('.') {
        Some((table, column)) => {
            validate_identifier(table)?;
            validate_identifier(column)
        }
        None => validate_identifier(name),
    }
}

/// Core identifier validation
fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::Empty);
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong(name.to_string(), MAX_IDENTIFIER_LENGTH));
    }

    for (i, c) in name.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return Err(ValidationError::InvalidIdentifier(
                name.to_string(),
                "contains invalid characters (only alphanumeric and underscore allowed)",
            ));
        }
        if i == 0 && !c.is_ascii_alphabetic() {
            return Err(ValidationError::InvalidIdentifier(
                name.to_string(),
                "must start with a letter",
            ));
        }
    }

    if RESERVED_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(ValidationError::Reserved(name.to_string()));
    }

    Ok(())
}
