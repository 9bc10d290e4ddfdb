//! Descriptor derivation from record declarations

use serde::Serialize;
use taskql::{format_number, quote_literal, ColumnSpec, ColumnType, CreateIndex, CreateTable, ForeignKey};

use super::{short_type_name, Entity, FieldCheck, FieldDef, FieldKind};
use crate::error::{Error, Result};
use crate::validation::{validate_column_name, validate_index_name, validate_table_name};

/// One persisted column, as derived from a field declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub field: &'static str,
    pub column_type: ColumnType,
    pub default: Option<String>,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub indexes: Vec<String>,
    pub check: Option<String>,
}

impl ColumnDescriptor {
    pub fn spec(&self) -> ColumnSpec {
        ColumnSpec {
            name: self.name.clone(),
            column_type: self.column_type,
            default: self.default.clone(),
            not_null: self.not_null,
            primary_key: self.primary_key,
            unique: self.unique,
            check: self.check.clone(),
        }
    }
}

/// A foreign-key edge from one of this table's columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceEdge {
    pub column: String,
    pub target_entity: &'static str,
    pub target_table: String,
    pub target_column: String,
}

/// Everything needed to create, query and map one table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDescriptor {
    pub table: String,
    pub entity: &'static str,
    /// Inherited columns first
    pub columns: Vec<ColumnDescriptor>,
    pub references: Vec<ReferenceEdge>,
}

impl TableDescriptor {
    /// Derive the descriptor of `E`
    pub fn of<E: Entity>() -> Result<Self> {
        let entity = short_type_name::<E>();
        if E::TABLE.is_empty() {
            return Err(Error::MissingTableName { entity });
        }
        validate_table_name(E::TABLE)?;

        let mut columns: Vec<ColumnDescriptor> = Vec::new();
        let mut references = Vec::new();

        for def in E::inherited().into_iter().chain(E::fields()) {
            let Some(column) = extract_column(entity, &def)? else {
                continue;
            };
            if columns.iter().any(|c| c.name.eq_ignore_ascii_case(&column.name)) {
                return Err(Error::DuplicateColumn {
                    table: E::TABLE.to_string(),
                    column: column.name,
                });
            }
            if let Some(reference) = &def.reference {
                validate_table_name(reference.table)?;
                validate_column_name(&reference.column)?;
                references.push(ReferenceEdge {
                    column: column.name.clone(),
                    target_entity: reference.entity,
                    target_table: reference.table.to_string(),
                    target_column: reference.column.clone(),
                });
            }
            columns.push(column);
        }

        if columns.is_empty() {
            return Err(Error::NoColumns { entity });
        }

        Ok(Self {
            table: E::TABLE.to_string(),
            entity,
            columns,
            references,
        })
    }

    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// The primary key, or a schema error naming this table.
    pub fn require_primary_key(&self) -> Result<&ColumnDescriptor> {
        self.primary_key().ok_or_else(|| Error::MissingPrimaryKey {
            table: self.table.clone(),
        })
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Tables this one references, excluding itself.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.references
            .iter()
            .map(|r| r.target_table.as_str())
            .filter(move |t| *t != self.table)
    }

    /// Foreign-key clauses, first-seen order
    ///
    /// Edges to the same table collapse into one composite key when they
    /// reference distinct target columns. When two edges share a target
    /// column (several fields pointing at `players.id`, say) each edge to
    /// that table gets its own clause, since `t(id, id)` is never a key of
    /// `t` and SQLite would reject every write with a foreign key mismatch.
    pub fn foreign_keys(&self) -> Vec<ForeignKey> {
        let mut keys: Vec<ForeignKey> = Vec::new();
        for edge in &self.references {
            let single = ForeignKey {
                columns: vec![edge.column.clone()],
                table: edge.target_table.clone(),
                references: vec![edge.target_column.clone()],
            };
            if !self.composite_target(&edge.target_table) {
                keys.push(single);
                continue;
            }
            match keys.iter_mut().find(|k| k.table == edge.target_table) {
                Some(key) => {
                    key.columns.push(edge.column.clone());
                    key.references.push(edge.target_column.clone());
                }
                None => keys.push(single),
            }
        }
        keys
    }

    /// True when every edge to `table` references a different column.
    fn composite_target(&self, table: &str) -> bool {
        let mut targets: Vec<&str> = self
            .references
            .iter()
            .filter(|r| r.target_table == table)
            .map(|r| r.target_column.as_str())
            .collect();
        let total = targets.len();
        targets.sort_unstable();
        targets.dedup();
        targets.len() == total
    }

    /// Index memberships grouped by index name, first-seen order
    pub fn indexes(&self) -> Vec<CreateIndex> {
        let mut indexes: Vec<CreateIndex> = Vec::new();
        for column in &self.columns {
            for name in &column.indexes {
                match indexes.iter_mut().find(|i| &i.name == name) {
                    Some(index) => index.columns.push(column.name.clone()),
                    None => indexes.push(CreateIndex {
                        name: name.clone(),
                        table: self.table.clone(),
                        columns: vec![column.name.clone()],
                        unique: false,
                        if_not_exists: true,
                    }),
                }
            }
        }
        indexes
    }

    pub fn create_statement(&self) -> CreateTable {
        CreateTable {
            name: self.table.clone(),
            if_not_exists: true,
            columns: self.columns.iter().map(ColumnDescriptor::spec).collect(),
            foreign_keys: self.foreign_keys(),
        }
    }
}

fn extract_column(entity: &'static str, def: &FieldDef) -> Result<Option<ColumnDescriptor>> {
    let Some(marker) = &def.column else {
        return Ok(None);
    };
    let column_type = def.kind.column_type().ok_or(Error::UnsupportedType {
        entity,
        field: def.field,
        rust_type: match def.kind {
            FieldKind::Other(name) => name,
            _ => "unknown",
        },
    })?;

    let name = if marker.name.is_empty() {
        def.field.to_string()
    } else {
        marker.name.clone()
    };
    validate_column_name(&name)?;
    for index in &marker.indexes {
        validate_index_name(index)?;
    }

    Ok(Some(ColumnDescriptor {
        check: check_clause(&name, def.kind, def.check.as_ref()),
        name,
        field: def.field,
        column_type,
        default: marker.default.clone(),
        not_null: def.not_null,
        primary_key: marker.primary_key,
        unique: marker.unique,
        indexes: marker.indexes.clone(),
    }))
}

/// CHECK expression for a field; enum-typed fields always get an IN check.
pub(crate) fn check_clause(column: &str, kind: FieldKind, check: Option<&FieldCheck>) -> Option<String> {
    let in_list = |values: &mut dyn Iterator<Item = &str>| {
        let quoted: Vec<String> = values.map(quote_literal).collect();
        format!("{} IN ({})", column, quoted.join(", "))
    };
    let literal = |value: &str| {
        if !kind.is_textual() && value.parse::<f64>().is_ok() {
            value.to_string()
        } else {
            quote_literal(value)
        }
    };

    match check {
        Some(FieldCheck::Range { min, max }) => Some(format!(
            "{} >= {} AND {} <= {}",
            column,
            format_number(*min),
            column,
            format_number(*max)
        )),
        Some(FieldCheck::Length { min, max }) => Some(format!("LENGTH({}) BETWEEN {} AND {}", column, min, max)),
        Some(FieldCheck::Uuid) => Some(format!("LENGTH({}) = 36", column)),
        Some(FieldCheck::Enum(values)) => Some(in_list(&mut values.iter().map(String::as_str))),
        Some(FieldCheck::Glob(pattern)) => Some(format!("{} GLOB {}", column, quote_literal(pattern))),
        Some(FieldCheck::NotValue(value)) => Some(format!("{} != {}", column, literal(value))),
        Some(FieldCheck::Min(min)) => Some(format!("{} >= {}", column, format_number(*min))),
        Some(FieldCheck::Max(max)) => Some(format!("{} <= {}", column, format_number(*max))),
        None => match kind {
            FieldKind::Enum(constants) => Some(in_list(&mut constants.iter().copied())),
            _ => None,
        },
    }
}
