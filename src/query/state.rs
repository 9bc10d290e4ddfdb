//! State shared by the entity-aware statement builders
//!
//! Every filtered builder (update, delete, select) carries a [`FilterState`]
//! and a [`Target`]. Contract violations made while chaining are recorded
//! and surface from the terminal `build()`/`execute()`, so the chain itself
//! never has to return `Result`.

use taskql::{BuildError, Condition, Conditions, Operand, Operator, Value, WhereGroup};

use crate::error::{Error, Result};
use crate::schema::{Entity, TableDescriptor};

/// What a builder operates on
#[derive(Debug)]
pub enum Target<'e, E> {
    /// Only the record type; values come from explicit calls
    Class,
    /// One record's current values
    Entity(&'e E),
    /// A record compared against an earlier snapshot of itself.
    /// Without a snapshot every populated column counts as changed.
    Diff { current: &'e E, previous: Option<&'e E> },
}

impl<'e, E: Entity> Target<'e, E> {
    /// The record whose primary key identifies the row: the previous
    /// snapshot in diff mode, since the key itself may have changed.
    fn key_source(&self) -> Option<&'e E> {
        match *self {
            Target::Class => None,
            Target::Entity(entity) => Some(entity),
            Target::Diff { current, previous } => Some(previous.unwrap_or(current)),
        }
    }

    /// Columns whose values differ between the snapshots, with their new values.
    pub(crate) fn changes(&self, descriptor: &TableDescriptor) -> Vec<(String, Value)> {
        let Target::Diff { current, previous } = *self else {
            return Vec::new();
        };
        descriptor
            .columns
            .iter()
            .filter_map(|column| {
                let now = current.get(&column.name);
                let changed = match previous {
                    Some(previous) => now != previous.get(&column.name),
                    None => !now.is_null(),
                };
                changed.then(|| (column.name.clone(), now))
            })
            .collect()
    }
}

/// Equality filters for a set of changed columns; NULL becomes `IS NULL`.
pub(crate) fn equality_conditions(changes: Vec<(String, Value)>) -> Result<Vec<Condition>> {
    changes
        .into_iter()
        .map(|(column, value)| {
            let condition = if value.is_null() {
                Condition::new(column, Operator::IsNull, Operand::None)
            } else {
                Condition::eq(column, value)
            };
            condition.map_err(Error::from)
        })
        .collect()
}

/// Accumulated WHERE tree, primary-key mode and the first contract error
#[derive(Debug, Default)]
pub struct FilterState {
    conditions: Conditions,
    by_id: bool,
    error: Option<BuildError>,
}

impl FilterState {
    pub(crate) fn record(&mut self, result: std::result::Result<(), BuildError>) {
        if let Err(err) = result {
            self.error.get_or_insert(err);
        }
    }

    /// Resolve the final WHERE tree.
    ///
    /// Primary-key mode replaces every other condition with `pk = ?`.
    /// Otherwise `prefix` conditions are AND-ed in front of the explicit tree.
    pub(crate) fn resolve<E: Entity>(
        self,
        descriptor: &TableDescriptor,
        target: &Target<'_, E>,
        operation: &'static str,
        prefix: Vec<Condition>,
    ) -> Result<WhereGroup> {
        if let Some(err) = self.error {
            return Err(err.into());
        }

        if self.by_id {
            let pk = descriptor.require_primary_key()?;
            let entity = target.key_source().ok_or(Error::NoEntity { operation })?;
            let value = entity.get(&pk.name);
            if value.is_null() {
                return Err(Error::NullPrimaryKey {
                    table: descriptor.table.clone(),
                    column: pk.name.clone(),
                });
            }
            return Ok(WhereGroup::single(Condition::eq(pk.name.clone(), value)?));
        }

        let mut root = self.conditions.finish();
        if !prefix.is_empty() {
            root.conditions.splice(0..0, prefix);
        }
        Ok(root)
    }
}

/// Condition-building calls shared by update, delete and select builders
pub trait Filter: Sized {
    #[doc(hidden)]
    fn filter_state(&mut self) -> &mut FilterState;

    /// Add a condition with an explicit operand.
    fn where_op(mut self, column: &str, operator: Operator, operand: Operand) -> Self {
        let state = self.filter_state();
        let result = state.conditions.add(column, operator, operand);
        state.record(result);
        self
    }

    /// Add a single-value condition.
    fn where_(self, column: &str, operator: Operator, value: impl Into<Value>) -> Self {
        self.where_op(column, operator, Operand::Single(value.into()))
    }

    fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_(column, Operator::Eq, value)
    }

    fn where_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_op(column, Operator::In, Operand::list(values))
    }

    fn where_not_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_op(column, Operator::NotIn, Operand::list(values))
    }

    fn where_like(self, column: &str, pattern: &str) -> Self {
        self.where_(column, Operator::Like, pattern)
    }

    fn where_null(self, column: &str) -> Self {
        self.where_op(column, Operator::IsNull, Operand::None)
    }

    fn where_not_null(self, column: &str) -> Self {
        self.where_op(column, Operator::IsNotNull, Operand::None)
    }

    /// Open a nested group attached to its parent with OR (`true`) or AND.
    fn begin_group(mut self, is_or: bool) -> Self {
        self.filter_state().conditions.begin_group(is_or);
        self
    }

    fn end_group(mut self) -> Self {
        let state = self.filter_state();
        let result = state.conditions.end_group();
        state.record(result);
        self
    }

    /// `begin_group` + `f` + `end_group`
    fn group(self, is_or: bool, f: impl FnOnce(Self) -> Self) -> Self {
        f(self.begin_group(is_or)).end_group()
    }

    /// Match the target record by primary key, replacing every other condition.
    fn by_id(mut self) -> Self {
        self.filter_state().by_id = true;
        self
    }
}
