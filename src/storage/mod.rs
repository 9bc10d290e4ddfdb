//! Storage layer for taskdb
//!
//! An in-memory SQLite connection per session, restored from and saved to a
//! durable file with the page-level backup API.

pub mod backup;
pub mod result;
pub mod session;

pub use result::{ResultSet, Row};
pub use session::{Session, SessionState};
