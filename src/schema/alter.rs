//! ALTER TABLE
//!
//! SQLite's `ALTER TABLE` only adds plain columns. Every other change is
//! done by rebuilding the table:
//!
//! 1. read the live `CREATE TABLE` and `CREATE INDEX` text from `sqlite_master`
//! 2. apply the changes to the parsed definition
//! 3. create `<table>_rebuild`, copy the surviving columns, drop the old
//!    table and rename the new one into place
//! 4. recreate indexes whose columns survived
//!
//! The rebuild runs in one savepoint with foreign-key enforcement suspended,
//! followed by `PRAGMA foreign_key_check`.

use regex::Regex;
use taskql::{parse_create_index, parse_create_table, AlterAction, AlterTable, ColumnDdl, ColumnSpec, IndexDdl, Sql, TableDdl};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::storage::Session;
use crate::validation::{validate_column_name, validate_table_name};

/// Suffix of the temporary table used during a rebuild
pub const REBUILD_SUFFIX: &str = "_rebuild";

/// One requested change
#[derive(Debug, Clone, PartialEq)]
pub enum AlterOp {
    AddColumn(ColumnSpec),
    DropColumn(String),
    RenameColumn { from: String, to: String },
    /// Replace a column's type and constraints, keeping its data
    ModifyColumn(ColumnSpec),
}

impl AlterOp {
    fn needs_rebuild(&self) -> bool {
        match self {
            AlterOp::AddColumn(spec) => !can_add_in_place(spec),
            _ => true,
        }
    }
}

/// Whether `ALTER TABLE ... ADD COLUMN` accepts this column.
fn can_add_in_place(spec: &ColumnSpec) -> bool {
    let constant_default = spec
        .default
        .as_deref()
        .map(|d| !d.to_ascii_uppercase().starts_with("CURRENT_"))
        .unwrap_or(true);
    !spec.primary_key && !spec.unique && constant_default && (!spec.not_null || spec.default.is_some())
}

/// Statements of a table rebuild
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildPlan {
    pub create: String,
    pub copy: String,
    pub drop: String,
    pub rename: String,
    pub indexes: Vec<String>,
    /// Indexes that covered a dropped column
    pub dropped_indexes: Vec<String>,
}

/// Alters one table
pub struct AlterTableBuilder<'s> {
    session: &'s Session,
    table: String,
    ops: Vec<AlterOp>,
    error: Option<Error>,
}

impl<'s> AlterTableBuilder<'s> {
    pub(crate) fn new(session: &'s Session, table: &str) -> Self {
        Self {
            session,
            table: table.to_string(),
            ops: Vec::new(),
            error: validate_table_name(table).err().map(Error::from),
        }
    }

    fn push(mut self, op: AlterOp, column: &str) -> Self {
        if let Err(err) = validate_column_name(column) {
            self.error.get_or_insert(err.into());
        }
        self.ops.push(op);
        self
    }

    pub fn add_column(self, spec: ColumnSpec) -> Self {
        let name = spec.name.clone();
        self.push(AlterOp::AddColumn(spec), &name)
    }

    /// Add a column as declared on the registered record type.
    pub fn add_declared(self, column: &str) -> Self {
        match self.declared(column) {
            Ok(spec) => self.add_column(spec),
            Err(err) => self.fail(err),
        }
    }

    pub fn drop_column(self, column: &str) -> Self {
        self.push(AlterOp::DropColumn(column.to_string()), column)
    }

    pub fn rename_column(self, from: &str, to: &str) -> Self {
        let op = AlterOp::RenameColumn {
            from: from.to_string(),
            to: to.to_string(),
        };
        self.push(op, to)
    }

    pub fn modify_column(self, spec: ColumnSpec) -> Self {
        let name = spec.name.clone();
        self.push(AlterOp::ModifyColumn(spec), &name)
    }

    /// Redefine a column as declared on the registered record type.
    pub fn modify_declared(self, column: &str) -> Self {
        match self.declared(column) {
            Ok(spec) => self.modify_column(spec),
            Err(err) => self.fail(err),
        }
    }

    fn declared(&self, column: &str) -> Result<ColumnSpec> {
        let descriptor = self.session.registry().get(&self.table).ok_or_else(|| Error::UnknownTable {
            table: self.table.clone(),
        })?;
        descriptor
            .column(column)
            .map(|c| c.spec())
            .ok_or_else(|| Error::UnsupportedAlter {
                table: self.table.clone(),
                reason: format!("'{}' is not declared on {}", column, descriptor.entity),
            })
    }

    fn fail(mut self, err: Error) -> Self {
        self.error.get_or_insert(err);
        self
    }

    /// Apply every change; returns the number of statements run.
    pub fn execute(self) -> Result<usize> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.ops.is_empty() {
            return Ok(0);
        }
        if self.ops.iter().any(AlterOp::needs_rebuild) {
            self.rebuild()
        } else {
            self.add_in_place()
        }
    }

    fn add_in_place(self) -> Result<usize> {
        let table = self.table;
        let statements: Vec<Sql> = self
            .ops
            .into_iter()
            .filter_map(|op| match op {
                AlterOp::AddColumn(spec) => Some(
                    AlterTable {
                        table: table.clone(),
                        action: AlterAction::AddColumn(spec),
                    }
                    .render(),
                ),
                _ => None,
            })
            .collect();
        self.session.transaction(|session| {
            for sql in &statements {
                session.execute(sql)?;
            }
            Ok(statements.len())
        })
    }

    fn rebuild(self) -> Result<usize> {
        let session = self.session;
        if session.in_transaction() {
            return Err(Error::UnsupportedAlter {
                table: self.table,
                reason: "a table rebuild cannot run inside a transaction".to_string(),
            });
        }

        let (table_sql, index_sql) = live_schema(session, &self.table)?;
        let plan = plan(&self.table, &table_sql, &index_sql, &self.ops)?;
        let foreign_keys = session.config().pragmas.foreign_keys;

        session.execute_raw("PRAGMA foreign_keys = OFF")?;
        let result = session.transaction(|s| {
            for text in [&plan.create, &plan.copy, &plan.drop, &plan.rename] {
                s.execute_raw(text)?;
            }
            for text in &plan.indexes {
                s.execute_raw(text)?;
            }
            let violations = s.execute_raw("PRAGMA foreign_key_check")?.into_rows();
            if !violations.is_empty() {
                return Err(Error::UnsupportedAlter {
                    table: self.table.clone(),
                    reason: format!("rebuild would leave {} foreign key violations", violations.len()),
                });
            }
            Ok(4 + plan.indexes.len())
        });
        if foreign_keys {
            if let Err(err) = session.execute_raw("PRAGMA foreign_keys = ON") {
                warn!(error = %err, "failed to re-enable foreign keys after rebuild");
            }
        }

        let statements = result?;
        for index in &plan.dropped_indexes {
            info!(table = %self.table, index = %index, "index dropped with its column");
        }
        info!(table = %self.table, changes = self.ops.len(), "table rebuilt");
        Ok(statements)
    }
}

/// Current CREATE TABLE text and CREATE INDEX texts of `table`.
fn live_schema(session: &Session, table: &str) -> Result<(String, Vec<String>)> {
    let rows = session
        .execute(&Sql::with_params(
            "SELECT type, sql FROM sqlite_master WHERE tbl_name = ? AND sql IS NOT NULL",
            vec![table.into()],
        ))?
        .into_rows();

    let mut table_sql = None;
    let mut index_sql = Vec::new();
    for row in rows.rows() {
        let sql = row.get("sql").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        match row.get("type").and_then(|v| v.as_str()) {
            Some("table") => table_sql = Some(sql),
            Some("index") => index_sql.push(sql),
            _ => {}
        }
    }
    let table_sql = table_sql.ok_or_else(|| Error::UnknownTable {
        table: table.to_string(),
    })?;
    Ok((table_sql, index_sql))
}

/// Plan a rebuild of `table` from its live DDL.
pub fn plan(table: &str, table_sql: &str, index_sql: &[String], ops: &[AlterOp]) -> Result<RebuildPlan> {
    let unsupported = |reason: String| Error::UnsupportedAlter {
        table: table.to_string(),
        reason,
    };

    let mut ddl: TableDdl = parse_create_table(table_sql)?;
    let mut indexes: Vec<IndexDdl> = index_sql
        .iter()
        .map(|sql| parse_create_index(sql))
        .collect::<std::result::Result<_, _>>()?;
    let mut dropped_indexes = Vec::new();

    // (current name, name in the old table) per column; None for added columns
    let mut sources: Vec<(String, Option<String>)> =
        ddl.columns.iter().map(|c| (c.name.clone(), Some(c.name.clone()))).collect();

    for op in ops {
        match op {
            AlterOp::AddColumn(spec) => {
                if ddl.column(&spec.name).is_some() {
                    return Err(unsupported(format!("column '{}' already exists", spec.name)));
                }
                ddl.columns.push(ColumnDdl {
                    name: spec.name.clone(),
                    definition: spec.constraints(),
                });
                sources.push((spec.name.clone(), None));
            }
            AlterOp::DropColumn(column) => {
                let index = ddl.column_index(column).ok_or_else(|| unsupported(format!("no column '{}'", column)))?;
                if ddl.columns.len() == 1 {
                    return Err(unsupported("cannot drop the only column".to_string()));
                }
                let pattern = word(table, column)?;
                let others = ddl
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != index)
                    .map(|(_, c)| c.definition.as_str());
                if let Some(user) = ddl.constraints.iter().map(String::as_str).chain(others).find(|c| pattern.is_match(c)) {
                    return Err(unsupported(format!("'{}' is used by `{}`", column, user)));
                }
                ddl.columns.remove(index);
                sources.remove(index);
                indexes.retain(|i| {
                    let keep = !i.covers(column);
                    if !keep {
                        dropped_indexes.push(i.name.clone());
                    }
                    keep
                });
            }
            AlterOp::RenameColumn { from, to } => {
                let index = ddl.column_index(from).ok_or_else(|| unsupported(format!("no column '{}'", from)))?;
                if ddl.column(to).is_some() {
                    return Err(unsupported(format!("column '{}' already exists", to)));
                }
                let pattern = word(table, from)?;
                for column in &mut ddl.columns {
                    column.definition = pattern.replace_all(&column.definition, to.as_str()).into_owned();
                }
                for constraint in &mut ddl.constraints {
                    *constraint = pattern.replace_all(constraint, to.as_str()).into_owned();
                }
                for index_ddl in &mut indexes {
                    for expr in &mut index_ddl.columns {
                        *expr = pattern.replace_all(expr, to.as_str()).into_owned();
                    }
                }
                ddl.columns[index].name = to.clone();
                sources[index].0 = to.clone();
            }
            AlterOp::ModifyColumn(spec) => {
                let index = ddl.column_index(&spec.name)
                    .ok_or_else(|| unsupported(format!("no column '{}'", spec.name)))?;
                ddl.columns[index].definition = spec.constraints();
            }
        }
    }

    let rebuild = format!("{}{}", table, REBUILD_SUFFIX);
    ddl.name = rebuild.clone();

    let (targets, selected): (Vec<&str>, Vec<&str>) = sources
        .iter()
        .filter_map(|(name, source)| source.as_deref().map(|s| (name.as_str(), s)))
        .unzip();

    Ok(RebuildPlan {
        create: ddl.to_sql(),
        copy: format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            rebuild,
            targets.join(", "),
            selected.join(", "),
            table
        ),
        drop: format!("DROP TABLE {}", table),
        rename: format!("ALTER TABLE {} RENAME TO {}", rebuild, table),
        indexes: indexes.iter().map(IndexDdl::to_sql).collect(),
        dropped_indexes,
    })
}

/// Case-insensitive whole-word match of an identifier.
fn word(table: &str, identifier: &str) -> Result<Regex> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(identifier))).map_err(|e| Error::UnsupportedAlter {
        table: table.to_string(),
        reason: e.to_string(),
    })
}
