//! Entity-aware statement builders
//!
//! Builders borrow a [`Session`](crate::Session), are consumed by their
//! terminal `execute()`, and hold no database resources of their own.

mod convert;
pub mod delete;
pub mod insert;
pub mod mapper;
pub mod select;
mod state;
pub mod update;

pub use convert::SqlField;
pub use delete::DeleteBuilder;
pub use insert::InsertBuilder;
pub use select::SelectBuilder;
pub use state::{Filter, FilterState, Target};
pub use update::UpdateBuilder;
