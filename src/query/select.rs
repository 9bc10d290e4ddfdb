//! SELECT builder

use std::sync::Arc;
use taskql::{BuildError, Join, OrderBy, OrderDirection, Select, Sql, Value};

use super::mapper;
use super::state::{equality_conditions, Filter, FilterState, Target};
use crate::error::{Error, Result};
use crate::schema::{Entity, TableDescriptor};
use crate::storage::{ResultSet, Session};
use crate::validation::validate_column_ref;

/// Queries `E`'s table
pub struct SelectBuilder<'s, 'e, E: Entity> {
    session: &'s Session,
    descriptor: Arc<TableDescriptor>,
    target: Target<'e, E>,
    filter: FilterState,
    select: Select,
    error: Option<Error>,
}

impl<'s, 'e, E: Entity> SelectBuilder<'s, 'e, E> {
    pub(crate) fn new(session: &'s Session, target: Target<'e, E>) -> Result<Self> {
        let descriptor = session.registry().descriptor::<E>()?;
        Ok(Self {
            select: Select::new(descriptor.table.clone()),
            session,
            descriptor,
            target,
            filter: FilterState::default(),
            error: None,
        })
    }

    /// Project these columns instead of `*`.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.select.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Equi-join `J`'s table on `left = J.right`.
    ///
    /// An unqualified `left` refers to this builder's table.
    pub fn join<J: Entity>(mut self, left: &str, right: &str) -> Self {
        let left = if left.contains('.') {
            left.to_string()
        } else {
            format!("{}.{}", self.descriptor.table, left)
        };
        if let Err(err) = validate_column_ref(&left).and_then(|()| validate_column_ref(right)) {
            self.error.get_or_insert(err.into());
        }
        self.select.joins.push(Join {
            table: J::TABLE.to_string(),
            left,
            right: right.to_string(),
        });
        self
    }

    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.select.group_by = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Raw HAVING clause; its parameters bind after the WHERE parameters.
    pub fn having(mut self, clause: &str, params: Vec<Value>) -> Self {
        self.select.having = Some((clause.to_string(), params));
        self
    }

    pub fn order_by(mut self, direction: OrderDirection, columns: &[&str]) -> Self {
        self.select.order_by = Some(OrderBy {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        match u64::try_from(limit) {
            Ok(n) if n > 0 => self.select.limit = Some(n),
            _ => self.filter.record(Err(BuildError::InvalidLimit(limit))),
        }
        self
    }

    /// Ignored unless a limit is also set.
    pub fn offset(mut self, offset: i64) -> Self {
        match u64::try_from(offset) {
            Ok(n) if n > 0 => self.select.offset = Some(n),
            _ => self.filter.record(Err(BuildError::InvalidOffset(offset))),
        }
        self
    }

    pub fn build(self) -> Result<Sql> {
        Ok(self.into_select()?.render())
    }

    fn into_select(self) -> Result<Select> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut select = self.select;
        let prefix = equality_conditions(self.target.changes(&self.descriptor))?;
        select.filter = self.filter.resolve(&self.descriptor, &self.target, "SELECT", prefix)?;
        Ok(select)
    }

    /// Raw rows
    pub fn execute(self) -> Result<ResultSet> {
        let session = self.session;
        let sql = self.build()?;
        Ok(session.execute(&sql)?.into_rows())
    }

    /// Every matching row as a record
    pub fn fetch_all(mut self) -> Result<Vec<E>> {
        self.project_own_columns();
        let descriptor = self.descriptor.clone();
        mapper::map_all(&descriptor, &self.execute()?)
    }

    /// First matching row as a record
    pub fn fetch_one(mut self) -> Result<Option<E>> {
        self.project_own_columns();
        let descriptor = self.descriptor.clone();
        mapper::map_first(&descriptor, &self.execute()?)
    }

    /// Number of rows the query would return
    pub fn count(self) -> Result<i64> {
        let session = self.session;
        let inner = self.build()?;
        let sql = Sql::with_params(format!("SELECT COUNT(*) FROM ({})", inner.text), inner.params);
        let rows = session.execute(&sql)?.into_rows();
        Ok(rows.scalar().and_then(Value::as_i64).unwrap_or(0))
    }

    /// With joins, `*` would also return the joined table's columns and
    /// shadow same-named ones.
    fn project_own_columns(&mut self) {
        if self.select.columns.is_empty() && !self.select.joins.is_empty() {
            self.select.columns = vec![format!("{}.*", self.descriptor.table)];
        }
    }
}

impl<E: Entity> Filter for SelectBuilder<'_, '_, E> {
    fn filter_state(&mut self) -> &mut FilterState {
        &mut self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::records::{self, Player, Team};
    use taskql::Operator;
    use tempfile::TempDir;

    fn session(tmp: &TempDir) -> Session {
        Session::open(StoreConfig::for_world(tmp.path()), records::registry().unwrap()).unwrap()
    }

    #[test]
    fn test_full_clause_order() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let sql = SelectBuilder::<Team>::new(&session, Target::Class)
            .unwrap()
            .columns(&["players.player_name", "COUNT(*) AS teams"])
            .join::<Player>("owner_id", "id")
            .where_("teams.level", Operator::Ge, 1)
            .group_by(&["players.player_name"])
            .having("COUNT(*) > ?", vec![Value::Integer(1)])
            .order_by(OrderDirection::Desc, &["teams"])
            .limit(10)
            .offset(5)
            .build()
            .unwrap();
        assert_eq!(
            sql.text,
            "SELECT players.player_name, COUNT(*) AS teams FROM teams JOIN players ON teams.owner_id = players.id \
             WHERE teams.level >= ? GROUP BY players.player_name HAVING COUNT(*) > ? ORDER BY teams DESC LIMIT 10 OFFSET 5"
        );
        assert_eq!(sql.params, vec![Value::Integer(1), Value::Integer(1)]);
    }

    #[test]
    fn test_offset_needs_limit() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let sql = SelectBuilder::<Player>::new(&session, Target::Class)
            .unwrap()
            .offset(20)
            .build()
            .unwrap();
        assert_eq!(sql.text, "SELECT * FROM players");
    }

    #[test]
    fn test_non_positive_limit_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let err = SelectBuilder::<Player>::new(&session, Target::Class)
            .unwrap()
            .limit(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::InvalidLimit(0))));

        let err = SelectBuilder::<Player>::new(&session, Target::Class)
            .unwrap()
            .limit(5)
            .offset(-1)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::InvalidOffset(-1))));
    }

    #[test]
    fn test_query_by_example() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let example = Player {
            level: Some(2),
            ..Default::default()
        };
        let sql = SelectBuilder::new(
            &session,
            Target::Diff {
                current: &example,
                previous: None,
            },
        )
        .unwrap()
        .build()
        .unwrap();
        assert_eq!(sql.text, "SELECT * FROM players WHERE level = ?");
    }

    #[test]
    fn test_join_columns_are_validated() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let err = SelectBuilder::<Team>::new(&session, Target::Class)
            .unwrap()
            .join::<Player>("owner_id", "id; DROP TABLE players")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_nested_group_of_groups() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let sql = SelectBuilder::<Player>::new(&session, Target::Class)
            .unwrap()
            .where_eq("level", 0)
            .group(false, |g| {
                g.group(true, |a| a.where_eq("role", "ADMIN"))
                    .group(true, |b| b.where_("points", Operator::Gt, 100))
            })
            .build()
            .unwrap();
        assert_eq!(
            sql.text,
            "SELECT * FROM players WHERE level = ? AND ((role = ?) OR (points > ?))"
        );
        assert_eq!(
            sql.params,
            vec![Value::Integer(0), Value::from("ADMIN"), Value::Integer(100)]
        );
    }
}
