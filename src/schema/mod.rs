//! Schema definitions for taskdb
//!
//! Record types describe their persisted shape explicitly:
//! - Which fields map to columns (and under what name)
//! - Defaults, primary key, uniqueness and index membership
//! - Foreign-key references to other record types
//! - Per-field CHECK constraints
//!
//! Descriptors are derived from these declarations by [`TableDescriptor::of`]
//! and registered once at startup in a [`SchemaRegistry`].

pub mod alter;
pub mod create;
pub mod dependency;
pub mod drop;
mod extract;

pub use extract::{ColumnDescriptor, ReferenceEdge, TableDescriptor};

use serde::Serialize;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use taskql::{ColumnType, Value};
use thiserror::Error;

use crate::error::{Error, Result};

/// Runtime type of a persisted field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Text,
    Uuid,
    /// Enum stored by constant name
    Enum(&'static [&'static str]),
    Int,
    Long,
    Double,
    /// Stored as seconds
    Duration,
    Bool,
    DateTime,
    /// Anything else; rejected when the descriptor is derived
    Other(&'static str),
}

impl FieldKind {
    /// Storage type for this kind, or `None` when it cannot be stored.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            FieldKind::Text | FieldKind::Uuid | FieldKind::Enum(_) => Some(ColumnType::Text),
            FieldKind::Int => Some(ColumnType::Integer),
            FieldKind::Long => Some(ColumnType::BigInt),
            FieldKind::Double | FieldKind::Duration => Some(ColumnType::Real),
            FieldKind::Bool => Some(ColumnType::Boolean),
            FieldKind::DateTime => Some(ColumnType::Timestamp),
            FieldKind::Other(_) => None,
        }
    }

    /// Whether values of this kind are compared as quoted text.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::Uuid | FieldKind::Enum(_) | FieldKind::DateTime
        )
    }
}

/// Column marker: a field without one is not persisted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Column {
    pub name: String,
    pub default: Option<String>,
    pub primary_key: bool,
    pub unique: bool,
    pub indexes: Vec<String>,
}

impl Column {
    /// Column with an explicit name; an empty name falls back to the field name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Raw default literal, e.g. `"0"`, `"'GUEST'"` or `"CURRENT_TIMESTAMP"`.
    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.indexes.push(name.into());
        self
    }
}

/// Reference marker pointing at another record type's table
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub entity: &'static str,
    pub table: &'static str,
    pub column: String,
}

impl Reference {
    /// Reference `E`'s `id` column.
    pub fn to<E: Entity>() -> Self {
        Self {
            entity: short_type_name::<E>(),
            table: E::TABLE,
            column: "id".to_string(),
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }
}

/// Validation constraint rendered as a CHECK clause
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCheck {
    Range { min: f64, max: f64 },
    Length { min: u32, max: u32 },
    Uuid,
    /// Explicit allowed constants
    Enum(Vec<String>),
    Glob(String),
    NotValue(String),
    Min(f64),
    Max(f64),
}

/// Declaration of one field of a record type
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub field: &'static str,
    pub kind: FieldKind,
    pub not_null: bool,
    pub column: Option<Column>,
    pub reference: Option<Reference>,
    pub check: Option<FieldCheck>,
}

impl FieldDef {
    pub fn new(field: &'static str, kind: FieldKind) -> Self {
        Self {
            field,
            kind,
            not_null: false,
            column: None,
            reference: None,
            check: None,
        }
    }

    /// Declare a field whose kind comes from its Rust type.
    pub fn of<T: crate::query::SqlField>(field: &'static str) -> Self {
        Self::new(field, T::kind())
    }

    pub fn column(mut self, column: Column) -> Self {
        self.column = Some(column);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn references(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn check(mut self, check: FieldCheck) -> Self {
        self.check = Some(check);
        self
    }
}

/// Failure reading or assigning a single column value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("no field maps to column '{0}'")]
    UnknownColumn(String),

    #[error("expected {expected}, got {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("'{value}' is not a valid {kind}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),
}

impl FieldError {
    pub fn mismatch(expected: &'static str, found: &Value) -> Self {
        FieldError::Mismatch {
            expected,
            found: found.type_name(),
        }
    }
}

/// Column access for a record or a shared base record
pub trait Columns {
    /// Declared fields, in declaration order.
    fn fields() -> Vec<FieldDef>;

    /// Current value of a column; `Value::Null` when unset or unknown.
    fn get(&self, column: &str) -> Value;

    /// Assign a raw engine value to the field behind `column`.
    fn set(&mut self, column: &str, value: Value) -> std::result::Result<(), FieldError>;
}

/// A record type persisted to exactly one table
pub trait Entity: Columns + Default + 'static {
    const TABLE: &'static str;

    /// Fields of the base record this type extends, most-base first.
    fn inherited() -> Vec<FieldDef> {
        Vec::new()
    }
}

/// Type name without its module path.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Registry of all record types known to a session
///
/// Built once at startup; a session takes ownership and never mutates it.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    by_type: HashMap<TypeId, Arc<TableDescriptor>>,
    by_table: HashMap<String, Arc<TableDescriptor>>,
    order: Vec<Arc<TableDescriptor>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive and register a record type's descriptor
    pub fn register<E: Entity>(&mut self) -> Result<Arc<TableDescriptor>> {
        if let Some(existing) = self.by_type.get(&TypeId::of::<E>()) {
            return Ok(existing.clone());
        }
        let descriptor = Arc::new(TableDescriptor::of::<E>()?);
        if self.by_table.contains_key(&descriptor.table) {
            return Err(Error::Config {
                message: format!("table '{}' is registered by two record types", descriptor.table),
            });
        }
        self.by_type.insert(TypeId::of::<E>(), descriptor.clone());
        self.by_table.insert(descriptor.table.clone(), descriptor.clone());
        self.order.push(descriptor.clone());
        Ok(descriptor)
    }

    /// Builder-style registration
    pub fn with<E: Entity>(mut self) -> Result<Self> {
        self.register::<E>()?;
        Ok(self)
    }

    /// Descriptor of `E`, derived on the fly when it was never registered.
    pub fn descriptor<E: Entity>(&self) -> Result<Arc<TableDescriptor>> {
        match self.by_type.get(&TypeId::of::<E>()) {
            Some(descriptor) => Ok(descriptor.clone()),
            None => Ok(Arc::new(TableDescriptor::of::<E>()?)),
        }
    }

    /// Get a descriptor by table name
    pub fn get(&self, table: &str) -> Option<&Arc<TableDescriptor>> {
        self.by_table.get(table)
    }

    /// All descriptors, in registration order
    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableDescriptor>> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registered tables that reference `table`, directly or transitively.
    pub fn dependents_of(&self, table: &str) -> Vec<Arc<TableDescriptor>> {
        let mut found: Vec<Arc<TableDescriptor>> = Vec::new();
        let mut frontier = vec![table.to_string()];
        while let Some(target) = frontier.pop() {
            for descriptor in &self.order {
                let refers = descriptor
                    .references
                    .iter()
                    .any(|r| r.target_table == target && descriptor.table != target);
                if refers && descriptor.table != table && !found.iter().any(|d| d.table == descriptor.table) {
                    found.push(descriptor.clone());
                    frontier.push(descriptor.table.clone());
                }
            }
        }
        found
    }

    /// Serialize every descriptor as YAML
    pub fn to_yaml(&self) -> Result<String> {
        let tables: Vec<&TableDescriptor> = self.order.iter().map(|d| d.as_ref()).collect();
        Ok(serde_yaml::to_string(&tables)?)
    }
}
