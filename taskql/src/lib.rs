//! taskql - statement model for taskdb
//!
//! Typed SQL statements for the subset of SQLite that taskdb generates,
//! rendered to parameterized text with positional `?` placeholders.
//!
//! # Overview
//!
//! ```text
//! CREATE TABLE IF NOT EXISTS players (id TEXT PRIMARY KEY CHECK(LENGTH(id) = 36), ...)
//! CREATE INDEX IF NOT EXISTS idx_player_name ON players(player_name)
//! INSERT INTO players (id, player_name) VALUES (?, ?)
//! UPDATE players SET points = ? WHERE id = ?
//! DELETE FROM players WHERE status = ? AND (role = ? OR role = ?)
//! SELECT * FROM teams JOIN players ON teams.owner_id = players.id WHERE ... LIMIT 10
//! ```
//!
//! - [`Conditions`] builds nested AND/OR condition trees with an explicit
//!   group stack and validates operator arity as conditions are added.
//! - [`parse_create_table`] reads DDL back from `sqlite_master`, which
//!   table rebuilds need.

mod ast;
mod condition;
mod error;
mod parser;
mod render;

pub use ast::*;
pub use condition::{Condition, Conditions, Operand, WhereGroup};
pub use error::{BuildError, ParseError};
pub use parser::{parse_create_index, parse_create_table, unquote, ColumnDdl, IndexDdl, TableDdl};
