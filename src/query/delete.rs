//! DELETE builder

use std::sync::Arc;
use taskql::{BuildError, Delete, Sql};

use super::state::{equality_conditions, Filter, FilterState, Target};
use crate::error::Result;
use crate::schema::{Entity, TableDescriptor};
use crate::storage::Session;

/// Deletes rows of `E`'s table; a WHERE clause is mandatory.
pub struct DeleteBuilder<'s, 'e, E: Entity> {
    session: &'s Session,
    descriptor: Arc<TableDescriptor>,
    target: Target<'e, E>,
    filter: FilterState,
}

impl<'s, 'e, E: Entity> DeleteBuilder<'s, 'e, E> {
    pub(crate) fn new(session: &'s Session, target: Target<'e, E>) -> Result<Self> {
        Ok(Self {
            descriptor: session.registry().descriptor::<E>()?,
            session,
            target,
            filter: FilterState::default(),
        })
    }

    pub fn build(self) -> Result<Sql> {
        let prefix = equality_conditions(self.target.changes(&self.descriptor))?;
        let filter = self.filter.resolve(&self.descriptor, &self.target, "DELETE", prefix)?;
        if filter.is_empty() {
            return Err(BuildError::MissingWhere { operation: "DELETE" }.into());
        }
        Ok(Delete {
            table: self.descriptor.table.clone(),
            filter,
        }
        .render())
    }

    /// Rows deleted
    pub fn execute(self) -> Result<usize> {
        let session = self.session;
        let sql = self.build()?;
        Ok(session.execute(&sql)?.affected())
    }
}

impl<E: Entity> Filter for DeleteBuilder<'_, '_, E> {
    fn filter_state(&mut self) -> &mut FilterState {
        &mut self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::error::Error;
    use crate::records::{self, Player};
    use taskql::Value;
    use tempfile::TempDir;

    fn session(tmp: &TempDir) -> Session {
        Session::open(StoreConfig::for_world(tmp.path()), records::registry().unwrap()).unwrap()
    }

    #[test]
    fn test_unfiltered_delete_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let err = DeleteBuilder::<Player>::new(&session, Target::Class)
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::MissingWhere { operation: "DELETE" })));
    }

    #[test]
    fn test_diff_changes_become_filters() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let previous = Player::new("Alex");
        let mut current = previous.clone();
        current.points = Some(0);

        let sql = DeleteBuilder::new(
            &session,
            Target::Diff {
                current: &current,
                previous: Some(&previous),
            },
        )
        .unwrap()
        .where_not_null("player_name")
        .build()
        .unwrap();
        assert_eq!(sql.text, "DELETE FROM players WHERE points = ? AND player_name IS NOT NULL");
        assert_eq!(sql.params, vec![Value::Integer(0)]);
    }

    #[test]
    fn test_grouped_conditions() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let sql = DeleteBuilder::<Player>::new(&session, Target::Class)
            .unwrap()
            .where_eq("status", "SUSPENDED")
            .group(true, |g| g.where_in("role", ["GUEST", "MEMBER"]).where_("level", taskql::Operator::Lt, 2))
            .build()
            .unwrap();
        assert_eq!(
            sql.text,
            "DELETE FROM players WHERE status = ? OR (role IN (?, ?) AND level < ?)"
        );
        assert_eq!(sql.params.len(), 4);
    }

    #[test]
    fn test_groups_without_root_conditions() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let sql = DeleteBuilder::<Player>::new(&session, Target::Class)
            .unwrap()
            .group(true, |g| g.where_eq("level", 1))
            .build()
            .unwrap();
        assert_eq!(sql.text, "DELETE FROM players WHERE (level = ?)");

        let sql = DeleteBuilder::<Player>::new(&session, Target::Class)
            .unwrap()
            .begin_group(true)
            .where_eq("role", "GUEST")
            .end_group()
            .begin_group(true)
            .where_eq("status", "SUSPENDED")
            .end_group()
            .build()
            .unwrap();
        assert_eq!(sql.text, "DELETE FROM players WHERE (role = ?) OR (status = ?)");
        assert_eq!(sql.params, vec![Value::from("GUEST"), Value::from("SUSPENDED")]);
    }
}
