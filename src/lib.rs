//! taskdb - schema-driven persistence for game-world task records
//!
//! Record types declare their columns once; taskdb derives table
//! descriptors from them, creates tables in foreign-key order and builds
//! parameterized statements against an in-memory SQLite database that is
//! mirrored to one durable file per world.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Session                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  Records    │  │  Schema     │  │   Schema Registry       │  │
//! │  │  (Columns)  │─▶│  Extractor  │─▶│   (TableDescriptors)    │  │
//! │  └─────────────┘  └─────────────┘  └───────────┬─────────────┘  │
//! │                                                │                │
//! │         ┌──────────────────────────────────────┤                │
//! │         ▼                                      ▼                │
//! │  ┌─────────────────────────┐  ┌─────────────────────────────┐   │
//! │  │  DDL builders           │  │  DML builders               │   │
//! │  │  create / alter / drop  │  │  insert / update / delete / │   │
//! │  │  + dependency order     │  │  select + condition tree    │   │
//! │  └────────────┬────────────┘  └──────────────┬──────────────┘   │
//! │               │          taskql::Sql         │                  │
//! │               ▼                              ▼                  │
//! │  ┌─────────────────────────────────────────────────────────────┐│
//! │  │              execute(): in-memory SQLite                    ││
//! │  └──────────────────────────┬──────────────────────────────────┘│
//! │                             │ page-level backup                 │
//! │                             ▼                                   │
//! │  ┌─────────────────────────────────────────────────────────────┐│
//! │  │                 <world>/task.db                             ││
//! │  └─────────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod query;
pub mod records;
pub mod schema;
pub mod storage;
pub mod validation;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use query::{Filter, SqlField};
pub use schema::{Columns, Entity, SchemaRegistry, TableDescriptor};
pub use storage::{ResultSet, Session};
pub use taskql::{Operator, OrderDirection, Sql, Value};

use query::{DeleteBuilder, InsertBuilder, SelectBuilder, Target, UpdateBuilder};
use schema::alter::AlterTableBuilder;
use schema::create::CreateTableBuilder;
use schema::drop::DropTableBuilder;

/// Result of executing one statement
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Rows returned by a query
    Rows(ResultSet),
    /// Number of rows changed
    Affected(usize),
}

impl QueryResult {
    /// Rows changed, or rows returned for a query.
    pub fn affected(&self) -> usize {
        match self {
            QueryResult::Rows(rows) => rows.len(),
            QueryResult::Affected(n) => *n,
        }
    }

    /// Returned rows; empty for statements that return none.
    pub fn into_rows(self) -> ResultSet {
        match self {
            QueryResult::Rows(rows) => rows,
            QueryResult::Affected(_) => ResultSet::default(),
        }
    }
}

/// Statement builders
impl Session {
    pub fn create_table<E: Entity>(&self) -> CreateTableBuilder<'_> {
        CreateTableBuilder::new(self).table::<E>()
    }

    /// Start an empty multi-table create; add tables with `table::<E>()`.
    pub fn create_tables(&self) -> CreateTableBuilder<'_> {
        CreateTableBuilder::new(self)
    }

    pub fn alter_table<E: Entity>(&self) -> AlterTableBuilder<'_> {
        AlterTableBuilder::new(self, E::TABLE)
    }

    /// Drop without `IF EXISTS`: a missing table is an error.
    pub fn drop_table(&self) -> DropTableBuilder<'_> {
        DropTableBuilder::new(self).if_exists(false)
    }

    pub fn drop_table_if_exists(&self) -> DropTableBuilder<'_> {
        DropTableBuilder::new(self)
    }

    pub fn insert<'e, E: Entity>(&self, entity: &'e E) -> Result<InsertBuilder<'_, 'e, E>> {
        InsertBuilder::new(self, vec![entity])
    }

    pub fn insert_all<'e, E: Entity>(&self, entities: &'e [E]) -> Result<InsertBuilder<'_, 'e, E>> {
        InsertBuilder::new(self, entities.iter().collect())
    }

    /// Update by explicit `set` calls and conditions.
    pub fn update<E: Entity>(&self) -> Result<UpdateBuilder<'_, 'static, E>> {
        UpdateBuilder::new(self, Target::Class)
    }

    /// Update every populated column of `entity`.
    pub fn update_entity<'e, E: Entity>(&self, entity: &'e E) -> Result<UpdateBuilder<'_, 'e, E>> {
        UpdateBuilder::new(self, Target::Entity(entity))
    }

    pub fn update_by_id<'e, E: Entity>(&self, entity: &'e E) -> Result<UpdateBuilder<'_, 'e, E>> {
        Ok(self.update_entity(entity)?.by_id())
    }

    /// Update only the columns that changed since `previous`.
    pub fn update_by_compare<'e, E: Entity>(
        &self,
        current: &'e E,
        previous: &'e E,
    ) -> Result<UpdateBuilder<'_, 'e, E>> {
        UpdateBuilder::new(
            self,
            Target::Diff {
                current,
                previous: Some(previous),
            },
        )
    }

    pub fn delete<E: Entity>(&self) -> Result<DeleteBuilder<'_, 'static, E>> {
        DeleteBuilder::new(self, Target::Class)
    }

    pub fn delete_by_id<'e, E: Entity>(&self, entity: &'e E) -> Result<DeleteBuilder<'_, 'e, E>> {
        Ok(DeleteBuilder::new(self, Target::Entity(entity))?.by_id())
    }

    /// Delete rows matching the columns that changed since `previous`.
    pub fn delete_by_compare<'e, E: Entity>(
        &self,
        current: &'e E,
        previous: &'e E,
    ) -> Result<DeleteBuilder<'_, 'e, E>> {
        DeleteBuilder::new(
            self,
            Target::Diff {
                current,
                previous: Some(previous),
            },
        )
    }

    pub fn select<E: Entity>(&self) -> Result<SelectBuilder<'_, 'static, E>> {
        SelectBuilder::new(self, Target::Class)
    }

    /// Select targeting one record, e.g. `select_entity(&p)?.by_id()`.
    pub fn select_entity<'e, E: Entity>(&self, entity: &'e E) -> Result<SelectBuilder<'_, 'e, E>> {
        SelectBuilder::new(self, Target::Entity(entity))
    }

    /// Filter on changed columns, or on every populated column of
    /// `current` when there is no previous snapshot.
    pub fn select_by_compare<'e, E: Entity>(
        &self,
        current: &'e E,
        previous: Option<&'e E>,
    ) -> Result<SelectBuilder<'_, 'e, E>> {
        SelectBuilder::new(self, Target::Diff { current, previous })
    }

    /// Every row of `E`'s table as records
    pub fn select_all<E: Entity>(&self) -> Result<Vec<E>> {
        self.select::<E>()?.fetch_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_result_helpers() {
        let rows = ResultSet::new(vec!["n".into()], vec![vec![Value::Integer(1)], vec![Value::Integer(2)]]);
        assert_eq!(QueryResult::Rows(rows.clone()).affected(), 2);
        assert_eq!(QueryResult::Rows(rows.clone()).into_rows(), rows);
        assert_eq!(QueryResult::Affected(3).affected(), 3);
        assert!(QueryResult::Affected(3).into_rows().is_empty());
    }
}
