//! INSERT builder

use std::sync::Arc;
use taskql::{BuildError, Insert, Sql};

use crate::error::Result;
use crate::schema::{Entity, TableDescriptor};
use crate::storage::Session;

/// Inserts one or more records; NULL fields are left to column defaults.
pub struct InsertBuilder<'s, 'e, E: Entity> {
    session: &'s Session,
    descriptor: Arc<TableDescriptor>,
    entities: Vec<&'e E>,
}

impl<'s, 'e, E: Entity> InsertBuilder<'s, 'e, E> {
    pub(crate) fn new(session: &'s Session, entities: Vec<&'e E>) -> Result<Self> {
        Ok(Self {
            descriptor: session.registry().descriptor::<E>()?,
            session,
            entities,
        })
    }

    /// One statement per record, in order.
    pub fn build(&self) -> Result<Vec<Sql>> {
        self.entities
            .iter()
            .map(|entity| Ok(insert_statement(&self.descriptor, *entity)?.render()))
            .collect()
    }

    /// Run every insert in one transaction; returns the rows inserted.
    pub fn execute(self) -> Result<usize> {
        let statements = self.build()?;
        self.session.transaction(|session| {
            let mut inserted = 0;
            for sql in &statements {
                inserted += session.execute(sql)?.affected();
            }
            Ok(inserted)
        })
    }
}

pub(crate) fn insert_statement<E: Entity>(descriptor: &TableDescriptor, entity: &E) -> Result<Insert> {
    let (columns, values): (Vec<String>, Vec<_>) = descriptor
        .columns
        .iter()
        .map(|column| (column.name.clone(), entity.get(&column.name)))
        .filter(|(_, value)| !value.is_null())
        .unzip();

    if columns.is_empty() {
        return Err(BuildError::NoValues {
            table: descriptor.table.clone(),
        }
        .into());
    }
    Ok(Insert {
        table: descriptor.table.clone(),
        columns,
        values,
    })
}
