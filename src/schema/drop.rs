//! DROP TABLE generation

use std::sync::Arc;
use taskql::{DropTable, Sql};
use tracing::info;

use super::dependency::DependencyGraph;
use super::{Entity, TableDescriptor};
use crate::error::{Error, Result};
use crate::storage::Session;
use crate::validation::validate_table_name;

/// Drops tables by name or record type
///
/// `IF EXISTS` is on unless turned off. SQLite has no `DROP ... CASCADE`;
/// with [`cascade`](Self::cascade) every registered table that references a
/// target, directly or transitively, is dropped too, referencing tables first.
pub struct DropTableBuilder<'s> {
    session: &'s Session,
    targets: Vec<String>,
    if_exists: bool,
    cascade: bool,
    error: Option<Error>,
}

impl<'s> DropTableBuilder<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self {
            session,
            targets: Vec::new(),
            if_exists: true,
            cascade: false,
            error: None,
        }
    }

    pub fn table(mut self, name: &str) -> Self {
        match validate_table_name(name) {
            Ok(()) => self.push(name.to_string()),
            Err(err) => {
                self.error.get_or_insert(err.into());
            }
        }
        self
    }

    pub fn entity<E: Entity>(mut self) -> Self {
        self.push(E::TABLE.to_string());
        self
    }

    pub fn if_exists(mut self, if_exists: bool) -> Self {
        self.if_exists = if_exists;
        self
    }

    pub fn cascade(mut self, cascade: bool) -> Self {
        self.cascade = cascade;
        self
    }

    fn push(&mut self, table: String) {
        if !self.targets.contains(&table) {
            self.targets.push(table);
        }
    }

    /// Tables to drop, in drop order.
    fn resolve(&self) -> Result<Vec<String>> {
        let registry = self.session.registry();
        let mut tables = self.targets.clone();
        if self.cascade {
            for target in &self.targets {
                for dependent in registry.dependents_of(target) {
                    if !tables.contains(&dependent.table) {
                        tables.push(dependent.table.clone());
                    }
                }
            }
        }

        let known: Vec<Arc<TableDescriptor>> = tables.iter().filter_map(|t| registry.get(t).cloned()).collect();
        let mut ordered: Vec<String> = DependencyGraph::new(known)
            .drop_order()?
            .iter()
            .map(|d| d.table.clone())
            .collect();
        ordered.extend(tables.into_iter().filter(|t| registry.get(t).is_none()));
        Ok(ordered)
    }

    pub fn build(self) -> Result<Vec<Sql>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(self
            .resolve()?
            .into_iter()
            .map(|name| {
                DropTable {
                    name,
                    if_exists: self.if_exists,
                }
                .render()
            })
            .collect())
    }

    /// Run every drop in one transaction.
    pub fn execute(self) -> Result<usize> {
        let session = self.session;
        let statements = self.build()?;
        let affected = session.transaction(|session| {
            let mut total = 0;
            for sql in &statements {
                total += session.execute(sql)?.affected();
            }
            Ok(total)
        })?;
        info!(statements = statements.len(), "tables dropped");
        Ok(affected)
    }
}
