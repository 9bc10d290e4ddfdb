//! UPDATE builder

use std::sync::Arc;
use taskql::{BuildError, Sql, Update, Value};
use tracing::debug;

use super::state::{Filter, FilterState, Target};
use crate::error::Result;
use crate::schema::{Entity, TableDescriptor};
use crate::storage::Session;

/// Updates rows of `E`'s table
///
/// - Class mode: only columns given to [`set`](Self::set).
/// - Entity mode: every non-null column of the record except its key.
/// - Diff mode: only columns that changed since the previous snapshot;
///   nothing changed means nothing runs.
pub struct UpdateBuilder<'s, 'e, E: Entity> {
    session: &'s Session,
    descriptor: Arc<TableDescriptor>,
    target: Target<'e, E>,
    assignments: Vec<(String, Value)>,
    filter: FilterState,
}

impl<'s, 'e, E: Entity> UpdateBuilder<'s, 'e, E> {
    pub(crate) fn new(session: &'s Session, target: Target<'e, E>) -> Result<Self> {
        Ok(Self {
            descriptor: session.registry().descriptor::<E>()?,
            session,
            target,
            assignments: Vec::new(),
            filter: FilterState::default(),
        })
    }

    /// Assign a column explicitly; later calls for the same column win.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.assignments.iter_mut().find(|(c, _)| c == column) {
            Some(slot) => slot.1 = value,
            None => self.assignments.push((column.to_string(), value)),
        }
        self
    }

    /// The statement, or `None` for a diff without changes.
    pub fn build(self) -> Result<Option<Sql>> {
        let mut assignments = match &self.target {
            Target::Class => Vec::new(),
            Target::Entity(entity) => {
                let pk = self.descriptor.primary_key().map(|c| c.name.as_str());
                self.descriptor
                    .columns
                    .iter()
                    .filter(|c| Some(c.name.as_str()) != pk)
                    .map(|c| (c.name.clone(), entity.get(&c.name)))
                    .filter(|(_, v)| !v.is_null())
                    .collect()
            }
            Target::Diff { .. } => {
                let changes = self.target.changes(&self.descriptor);
                if changes.is_empty() && self.assignments.is_empty() {
                    debug!(table = %self.descriptor.table, "no changes, skipping update");
                    return Ok(None);
                }
                changes
            }
        };
        for (column, value) in self.assignments {
            match assignments.iter_mut().find(|(c, _)| *c == column) {
                Some(slot) => slot.1 = value,
                None => assignments.push((column, value)),
            }
        }
        if assignments.is_empty() {
            return Err(BuildError::NoAssignments {
                table: self.descriptor.table.clone(),
            }
            .into());
        }

        let filter = self.filter.resolve(&self.descriptor, &self.target, "UPDATE", Vec::new())?;
        if filter.is_empty() {
            return Err(BuildError::MissingWhere { operation: "UPDATE" }.into());
        }

        Ok(Some(
            Update {
                table: self.descriptor.table.clone(),
                assignments,
                filter,
            }
            .render(),
        ))
    }

    /// Rows updated; 0 without running anything when a diff found no changes.
    pub fn execute(self) -> Result<usize> {
        let session = self.session;
        match self.build()? {
            Some(sql) => Ok(session.execute(&sql)?.affected()),
            None => Ok(0),
        }
    }
}

impl<E: Entity> Filter for UpdateBuilder<'_, '_, E> {
    fn filter_state(&mut self) -> &mut FilterState {
        &mut self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::records::{self, Player};
    use crate::config::StoreConfig;
    use tempfile::TempDir;

    fn session(tmp: &TempDir) -> Session {
        Session::open(StoreConfig::for_world(tmp.path()), records::registry().unwrap()).unwrap()
    }

    #[test]
    fn test_entity_mode_skips_key_and_nulls() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let mut player = Player::new("Alex");
        player.points = Some(3);

        let sql = UpdateBuilder::new(&session, Target::Entity(&player))
            .unwrap()
            .by_id()
            .build()
            .unwrap()
            .unwrap();
        assert_eq!(sql.text, "UPDATE players SET player_name = ?, points = ? WHERE id = ?");
    }

    #[test]
    fn test_diff_without_changes_builds_nothing() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let player = Player::new("Alex");
        let snapshot = player.clone();

        let builder = UpdateBuilder::new(
            &session,
            Target::Diff {
                current: &player,
                previous: Some(&snapshot),
            },
        )
        .unwrap()
        .by_id();
        assert!(builder.build().unwrap().is_none());
    }

    #[test]
    fn test_diff_sets_cleared_columns_to_null() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let mut previous = Player::new("Alex");
        previous.display_name = Some("Al".into());
        let mut current = previous.clone();
        current.display_name = None;
        current.level = Some(4);

        let sql = UpdateBuilder::new(
            &session,
            Target::Diff {
                current: &current,
                previous: Some(&previous),
            },
        )
        .unwrap()
        .by_id()
        .build()
        .unwrap()
        .unwrap();
        assert_eq!(sql.text, "UPDATE players SET display_name = ?, level = ? WHERE id = ?");
        assert_eq!(sql.params[0], Value::Null);
        assert_eq!(sql.params[1], Value::Integer(4));
    }

    #[test]
    fn test_where_is_required() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let err = UpdateBuilder::<Player>::new(&session, Target::Class)
            .unwrap()
            .set("points", 0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::MissingWhere { operation: "UPDATE" })));
    }

    #[test]
    fn test_class_mode_needs_assignments() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let err = UpdateBuilder::<Player>::new(&session, Target::Class)
            .unwrap()
            .where_eq("level", 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::NoAssignments { .. })));
    }
}
