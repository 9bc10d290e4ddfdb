//! Error types for taskql

use std::fmt;
use thiserror::Error;

/// A statement could not be assembled from the calls made on a builder
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("{operator} on '{column}' takes no value")]
    UnexpectedValue { column: String, operator: &'static str },

    #[error("{operator} on '{column}' requires exactly one non-null value")]
    MissingValue { column: String, operator: &'static str },

    #[error("{operator} on '{column}' requires a list of values")]
    ExpectedList { column: String, operator: &'static str },

    #[error("{operator} on '{column}' requires a non-empty list")]
    EmptyList { column: String, operator: &'static str },

    #[error("end_group called with no open group")]
    UnbalancedGroup,

    #[error("{operation} requires a WHERE clause")]
    MissingWhere { operation: &'static str },

    #[error("LIMIT must be positive, got {0}")]
    InvalidLimit(i64),

    #[error("OFFSET must be positive, got {0}")]
    InvalidOffset(i64),

    #[error("nothing to insert into '{table}': every column is null")]
    NoValues { table: String },

    #[error("nothing to set on '{table}'")]
    NoAssignments { table: String },
}

/// Error that occurred while parsing DDL text
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub position: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }

    pub fn with_position(mut self, pos: usize) -> Self {
        self.position = Some(pos);
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error: {}", self.message)?;
        if let Some(pos) = self.position {
            write!(f, " at position {}", pos)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

impl From<nom::Err<nom::error::Error<&str>>> for ParseError {
    fn from(err: nom::Err<nom::error::Error<&str>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => ParseError::new("Incomplete input"),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                ParseError::new(format!("Parse error near: {:?}", e.input.chars().take(20).collect::<String>()))
            }
        }
    }
}
