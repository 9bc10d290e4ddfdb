//! CREATE TABLE generation

use std::sync::Arc;
use taskql::Sql;
use tracing::info;

use super::dependency::DependencyGraph;
use super::{Entity, TableDescriptor};
use crate::error::{Error, Result};
use crate::storage::Session;

/// CREATE TABLE and CREATE INDEX statements for a set of tables.
///
/// Tables come out in dependency order; a foreign-key cycle fails the whole
/// set before any statement is produced.
pub fn create_statements(descriptors: impl IntoIterator<Item = Arc<TableDescriptor>>) -> Result<Vec<Sql>> {
    let order = DependencyGraph::new(descriptors).creation_order()?;
    let mut statements = Vec::new();
    for descriptor in order {
        statements.push(descriptor.create_statement().render());
        statements.extend(descriptor.indexes().iter().map(|index| index.render()));
    }
    Ok(statements)
}

/// Creates one or more tables
pub struct CreateTableBuilder<'s> {
    session: &'s Session,
    descriptors: Vec<Arc<TableDescriptor>>,
    error: Option<Error>,
}

impl<'s> CreateTableBuilder<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self {
            session,
            descriptors: Vec::new(),
            error: None,
        }
    }

    /// Add a record type's table.
    pub fn table<E: Entity>(mut self) -> Self {
        match self.session.registry().descriptor::<E>() {
            Ok(descriptor) => self.descriptors.push(descriptor),
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    /// Add every registered table.
    pub fn registered(mut self) -> Self {
        self.descriptors.extend(self.session.registry().tables().cloned());
        self
    }

    pub fn build(self) -> Result<Vec<Sql>> {
        match self.error {
            Some(err) => Err(err),
            None => create_statements(self.descriptors),
        }
    }

    /// Run every statement in one transaction.
    pub fn execute(self) -> Result<usize> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let statements = create_statements(self.descriptors.iter().cloned())?;
        let tables: Vec<&str> = self.descriptors.iter().map(|d| d.table.as_str()).collect();
        let affected = self.session.transaction(|session| {
            let mut total = 0;
            for sql in &statements {
                total += session.execute(sql)?.affected();
            }
            Ok(total)
        })?;
        info!(tables = ?tables, statements = statements.len(), "tables created");
        Ok(affected)
    }
}
