//! WHERE clause trees
//!
//! A [`WhereGroup`] holds its own leaf conditions plus nested child groups.
//! Rendering joins a group's own conditions with `AND`, then appends every
//! non-empty child group in parentheses, attached with `OR` when the child
//! was opened as an OR group and `AND` otherwise.
//!
//! [`Conditions`] builds a tree with an explicit stack of open groups, so
//! `begin_group` / `end_group` never have to search for a parent.

use crate::ast::{Arity, Operator, Value};
use crate::error::BuildError;

/// The right-hand side of a condition
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Single(Value),
    List(Vec<Value>),
}

impl Operand {
    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Operand::List(values.into_iter().map(Into::into).collect())
    }
}

/// One leaf comparison whose parameter count matches its operator
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    column: String,
    operator: Operator,
    params: Vec<Value>,
}

impl Condition {
    /// Validate the operand against the operator's arity.
    pub fn new(column: impl Into<String>, operator: Operator, operand: Operand) -> Result<Self, BuildError> {
        let column = column.into();
        let params = match (operator.arity(), operand) {
            (Arity::None, Operand::None) => vec![],
            (Arity::None, _) => {
                return Err(BuildError::UnexpectedValue {
                    column,
                    operator: operator.symbol(),
                })
            }
            (Arity::Many, Operand::List(values)) => {
                if values.is_empty() {
                    return Err(BuildError::EmptyList {
                        column,
                        operator: operator.symbol(),
                    });
                }
                values
            }
            (Arity::Many, _) => {
                return Err(BuildError::ExpectedList {
                    column,
                    operator: operator.symbol(),
                })
            }
            (Arity::One, Operand::Single(value)) if !value.is_null() => vec![value],
            (Arity::One, _) => {
                return Err(BuildError::MissingValue {
                    column,
                    operator: operator.symbol(),
                })
            }
        };
        Ok(Self {
            column,
            operator,
            params,
        })
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Result<Self, BuildError> {
        Self::new(column, Operator::Eq, Operand::Single(value.into()))
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    fn render(&self, text: &mut String, params: &mut Vec<Value>) {
        text.push_str(&self.column);
        text.push(' ');
        text.push_str(self.operator.symbol());
        match self.operator.arity() {
            Arity::None => {}
            Arity::One => text.push_str(" ?"),
            Arity::Many => {
                let placeholders = vec!["?"; self.params.len()].join(", ");
                text.push_str(" (");
                text.push_str(&placeholders);
                text.push(')');
            }
        }
        params.extend(self.params.iter().cloned());
    }
}

/// A node of the condition tree
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WhereGroup {
    /// How this group attaches to its parent; ignored for the root
    pub is_or: bool,
    pub conditions: Vec<Condition>,
    pub groups: Vec<WhereGroup>,
}

impl WhereGroup {
    pub fn new(is_or: bool) -> Self {
        Self {
            is_or,
            ..Default::default()
        }
    }

    /// A root group holding a single condition.
    pub fn single(condition: Condition) -> Self {
        Self {
            is_or: false,
            conditions: vec![condition],
            groups: vec![],
        }
    }

    /// True when rendering would produce no text.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.groups.iter().all(WhereGroup::is_empty)
    }

    /// Render the clause body (no `WHERE` keyword) and its parameters.
    pub fn render(&self) -> (String, Vec<Value>) {
        let mut text = String::new();
        let mut params = Vec::new();
        self.render_into(&mut text, &mut params);
        (text, params)
    }

    fn render_into(&self, text: &mut String, params: &mut Vec<Value>) {
        // `text` may already hold the enclosing statement
        let mut wrote = false;
        for condition in &self.conditions {
            if wrote {
                text.push_str(" AND ");
            }
            condition.render(text, params);
            wrote = true;
        }
        for group in &self.groups {
            if group.is_empty() {
                continue;
            }
            if wrote {
                text.push_str(if group.is_or { " OR " } else { " AND " });
            }
            text.push('(');
            group.render_into(text, params);
            text.push(')');
            wrote = true;
        }
    }

    /// Append ` WHERE ...` to a statement when the tree is non-empty.
    pub fn append_to(&self, text: &mut String, params: &mut Vec<Value>) {
        if self.is_empty() {
            return;
        }
        text.push_str(" WHERE ");
        self.render_into(text, params);
    }
}

/// Fluent construction of a [`WhereGroup`] tree
#[derive(Debug, Clone)]
pub struct Conditions {
    // stack[0] is the root; the last entry is the group being filled
    stack: Vec<WhereGroup>,
}

impl Default for Conditions {
    fn default() -> Self {
        Self::new()
    }
}

impl Conditions {
    pub fn new() -> Self {
        Self {
            stack: vec![WhereGroup::default()],
        }
    }

    pub fn push(&mut self, condition: Condition) {
        self.current().conditions.push(condition);
    }

    pub fn add(&mut self, column: impl Into<String>, operator: Operator, operand: Operand) -> Result<(), BuildError> {
        let condition = Condition::new(column, operator, operand)?;
        self.push(condition);
        Ok(())
    }

    /// Open a child group of the current group.
    pub fn begin_group(&mut self, is_or: bool) {
        self.stack.push(WhereGroup::new(is_or));
    }

    /// Close the innermost open group and attach it to its parent.
    pub fn end_group(&mut self) -> Result<(), BuildError> {
        if self.stack.len() < 2 {
            return Err(BuildError::UnbalancedGroup);
        }
        let group = self.stack.pop().ok_or(BuildError::UnbalancedGroup)?;
        self.current().groups.push(group);
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.stack.iter().all(WhereGroup::is_empty)
    }

    /// Close any groups still open and return the root.
    pub fn finish(mut self) -> WhereGroup {
        while self.stack.len() > 1 {
            if let Some(group) = self.stack.pop() {
                self.current().groups.push(group);
            }
        }
        self.stack.pop().unwrap_or_default()
    }

    fn current(&mut self) -> &mut WhereGroup {
        if self.stack.is_empty() {
            self.stack.push(WhereGroup::default());
        }
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }
}
