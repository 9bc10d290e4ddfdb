//! Session lifecycle
//!
//! A session owns one in-memory SQLite database mirrored to a durable file.
//! The file is read once when the session opens and written when it is
//! saved or closed; every statement in between runs against memory.

use rusqlite::Connection;
use std::cell::Cell;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use taskql::Sql;
use tracing::{debug, error, info, warn};

use super::backup;
use super::result::{from_sqlite, to_sqlite, ResultSet};
use crate::config::{PragmaConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::schema::create::create_statements;
use crate::schema::SchemaRegistry;
use crate::QueryResult;

/// Lifecycle of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Initializing,
    Ready,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Closed => "closed",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One world's database: an in-memory working copy plus its durable file
pub struct Session {
    conn: Connection,
    config: StoreConfig,
    registry: SchemaRegistry,
    state: SessionState,
    savepoints: Cell<usize>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.config.path)
            .field("state", &self.state)
            .field("tables", &self.registry.len())
            .finish()
    }
}

impl Session {
    /// Open a session
    ///
    /// Without a durable file the registered schema is created from scratch
    /// and snapshotted immediately. With one, the file is restored into memory
    /// and any newly registered tables are added.
    pub fn open(config: StoreConfig, registry: SchemaRegistry) -> Result<Self> {
        config.validate()?;
        let mut session = Self {
            conn: Connection::open_in_memory()?,
            config,
            registry,
            state: SessionState::Initializing,
            savepoints: Cell::new(0),
        };

        if session.config.path.exists() {
            info!(path = %session.config.path.display(), "restoring session");
            backup::restore(&mut session.conn, &session.config.path, &session.config.backup)?;
            apply_pragmas(&session.conn, &session.config.pragmas)?;
            session.ensure_schema()?;
        } else {
            info!(path = %session.config.path.display(), "no durable file, bootstrapping schema");
            apply_pragmas(&session.conn, &session.config.pragmas)?;
            session.ensure_schema()?;
            backup::save(&session.conn, &session.config.path, &session.config.backup)?;
        }

        session.state = SessionState::Ready;
        info!(tables = session.registry.len(), "session ready");
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Execute one statement
    ///
    /// Failures are logged with the statement text and parameters and
    /// returned as [`Error::Execution`].
    pub fn execute(&self, sql: &Sql) -> Result<QueryResult> {
        self.ensure_ready()?;
        run(&self.conn, sql)
    }

    /// Execute raw SQL text without parameters
    pub fn execute_raw(&self, text: &str) -> Result<QueryResult> {
        self.execute(&Sql::new(text))
    }

    /// Run `f` atomically
    ///
    /// Implemented with savepoints, so calls nest.
    pub fn transaction<T>(&self, f: impl FnOnce(&Session) -> Result<T>) -> Result<T> {
        self.ensure_ready()?;
        self.savepoint(f)
    }

    pub(crate) fn in_transaction(&self) -> bool {
        self.savepoints.get() > 0
    }

    fn savepoint<T>(&self, f: impl FnOnce(&Session) -> Result<T>) -> Result<T> {
        let depth = self.savepoints.get();
        let name = format!("taskdb_sp{}", depth);
        self.conn.execute_batch(&format!("SAVEPOINT {}", name))?;
        self.savepoints.set(depth + 1);
        let result = f(self);
        self.savepoints.set(depth);

        match result {
            Ok(value) => {
                self.conn.execute_batch(&format!("RELEASE {}", name))?;
                Ok(value)
            }
            Err(err) => {
                debug!(savepoint = %name, "rolling back");
                if let Err(rollback) = self
                    .conn
                    .execute_batch(&format!("ROLLBACK TO {}; RELEASE {}", name, name))
                {
                    warn!(savepoint = %name, error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Names of user tables present in the database
    pub fn table_names(&self) -> Result<Vec<String>> {
        let rows = self
            .execute_raw("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")?
            .into_rows();
        Ok(rows
            .rows()
            .filter_map(|row| row.get("name").and_then(|v| v.as_str()).map(String::from))
            .collect())
    }

    /// Snapshot the in-memory database to the durable file
    pub fn save(&self) -> Result<()> {
        self.ensure_ready()?;
        backup::save(&self.conn, &self.config.path, &self.config.backup)
    }

    /// Snapshot the in-memory database to another file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.ensure_ready()?;
        backup::save(&self.conn, path, &self.config.backup)
    }

    /// Save and close the session
    pub fn close(mut self) -> Result<()> {
        let result = self.save();
        self.state = SessionState::Closed;
        info!(path = %self.config.path.display(), "session closed");
        result
    }

    /// Close without saving; changes since the last save are lost.
    pub fn discard(mut self) {
        self.state = SessionState::Closed;
        debug!(path = %self.config.path.display(), "session discarded without saving");
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            SessionState::Ready => Ok(()),
            other => Err(Error::SessionNotReady { state: other.as_str() }),
        }
    }

    /// CREATE TABLE IF NOT EXISTS for every registered table, in dependency order.
    fn ensure_schema(&self) -> Result<()> {
        let statements = create_statements(self.registry.tables().cloned())?;
        self.savepoint(|session| {
            for sql in &statements {
                run(&session.conn, sql)?;
            }
            Ok(())
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state != SessionState::Ready {
            return;
        }
        if let Err(err) = backup::save(&self.conn, &self.config.path, &self.config.backup) {
            error!(path = %self.config.path.display(), error = %err, "failed to save session on drop");
        }
        self.state = SessionState::Closed;
    }
}

/// Apply connection pragmas
pub(crate) fn apply_pragmas(conn: &Connection, pragmas: &PragmaConfig) -> Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA foreign_keys = {};",
        if pragmas.foreign_keys { "ON" } else { "OFF" }
    ))?;
    conn.execute_batch(&format!("PRAGMA journal_mode = {};", pragmas.journal_mode.pragma_value()))?;
    conn.execute_batch(&format!("PRAGMA synchronous = {};", pragmas.synchronous.pragma_value()))?;
    conn.execute_batch(&format!("PRAGMA cache_size = {};", pragmas.cache_size))?;
    conn.busy_timeout(Duration::from_millis(pragmas.busy_timeout_ms))?;
    Ok(())
}

/// Prepare, bind and run one statement.
pub(crate) fn run(conn: &Connection, sql: &Sql) -> Result<QueryResult> {
    debug!(sql = %sql.text, params = sql.params.len(), "executing statement");
    run_statement(conn, sql).map_err(|source| {
        error!(sql = %sql.text, params = ?sql.params, error = %source, "statement failed");
        Error::Execution {
            sql: sql.text.clone(),
            source,
        }
    })
}

fn run_statement(conn: &Connection, sql: &Sql) -> rusqlite::Result<QueryResult> {
    let mut stmt = conn.prepare(&sql.text)?;
    let params = rusqlite::params_from_iter(sql.params.iter().map(to_sqlite));

    if stmt.column_count() == 0 {
        return Ok(QueryResult::Affected(stmt.execute(params)?));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params)?;
    let mut data = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(from_sqlite(row.get_ref(i)?));
        }
        data.push(values);
    }
    Ok(QueryResult::Rows(ResultSet::new(columns, data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records;
    use tempfile::TempDir;
    use taskql::Value;

    fn open(tmp: &TempDir) -> Session {
        Session::open(StoreConfig::for_world(tmp.path()), records::registry().unwrap()).unwrap()
    }

    #[test]
    fn test_bootstrap_creates_file_and_tables() {
        let tmp = TempDir::new().unwrap();
        let session = open(&tmp);
        assert_eq!(session.state(), SessionState::Ready);
        assert!(tmp.path().join("task.db").exists());
        assert_eq!(
            session.table_names().unwrap(),
            vec!["players", "tags", "team_members", "teams"]
        );
    }

    #[test]
    fn test_pragmas_applied() {
        let tmp = TempDir::new().unwrap();
        let session = open(&tmp);
        let fk = session.execute_raw("PRAGMA foreign_keys").unwrap().into_rows();
        assert_eq!(fk.scalar(), Some(&Value::Integer(1)));
        let cache = session.execute_raw("PRAGMA cache_size").unwrap().into_rows();
        assert_eq!(cache.scalar(), Some(&Value::Integer(10_000)));
    }

    #[test]
    fn test_execution_errors_are_returned() {
        let tmp = TempDir::new().unwrap();
        let session = open(&tmp);
        let err = session.execute_raw("SELECT * FROM missing_table").unwrap_err();
        assert!(matches!(err, Error::Execution { ref sql, .. } if sql.contains("missing_table")));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let tmp = TempDir::new().unwrap();
        let session = open(&tmp);
        session.execute_raw("CREATE TABLE notes (body TEXT)").unwrap();

        let result: Result<()> = session.transaction(|s| {
            s.execute_raw("INSERT INTO notes (body) VALUES ('kept?')")?;
            s.transaction(|inner| {
                inner.execute_raw("INSERT INTO notes (body) VALUES ('nested')")?;
                Ok(())
            })?;
            s.execute_raw("INSERT INTO nowhere VALUES (1)")?;
            Ok(())
        });
        assert!(result.is_err());

        let count = session.execute_raw("SELECT COUNT(*) FROM notes").unwrap().into_rows();
        assert_eq!(count.scalar(), Some(&Value::Integer(0)));
        assert!(!session.in_transaction());
    }

    #[test]
    fn test_every_record_type_accepts_a_row() {
        use crate::records::{Player, Tag, Team, TeamMember};

        let tmp = TempDir::new().unwrap();
        let session = open(&tmp);
        let owner = Player::new("Alex");
        let other = Player::new("Sam");
        session.insert_all(&[owner.clone(), other.clone()]).unwrap().execute().unwrap();
        let (owner_id, other_id) = (owner.id.unwrap(), other.id.unwrap());

        let team = Team::new("Red", "RED1", owner_id);
        session.insert(&team).unwrap().execute().unwrap();
        let mut tag = Tag::new("urgent", "");
        tag.owner_id = Some(owner_id);
        session.insert(&tag).unwrap().execute().unwrap();
        let mut member = TeamMember::new(team.id.unwrap(), other_id, owner_id);
        member.last_operator_id = Some(owner_id);
        session.insert(&member).unwrap().execute().unwrap();

        for table in ["players", "teams", "tags", "team_members"] {
            let rows = session
                .execute_raw(&format!("SELECT COUNT(*) FROM {}", table))
                .unwrap()
                .into_rows();
            let expected = if table == "players" { 2 } else { 1 };
            assert_eq!(rows.scalar(), Some(&Value::Integer(expected)), "{}", table);
        }
        let violations = session.execute_raw("PRAGMA foreign_key_check").unwrap().into_rows();
        assert!(violations.is_empty());

        // the member row references `other` once and `owner` twice
        session.delete_by_id(&other).unwrap().execute().unwrap();
        let members = session.execute_raw("SELECT COUNT(*) FROM team_members").unwrap().into_rows();
        assert_eq!(members.scalar(), Some(&Value::Integer(0)));
        let teams = session.execute_raw("SELECT COUNT(*) FROM teams").unwrap().into_rows();
        assert_eq!(teams.scalar(), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_drop_saves_ready_session() {
        let tmp = TempDir::new().unwrap();
        {
            let session = open(&tmp);
            session
                .execute_raw("INSERT INTO players (id, player_name) VALUES ('0f8fad5b-d9cb-469f-a165-70867728950e', 'Alex')")
                .unwrap();
        }
        let session = open(&tmp);
        let rows = session.execute_raw("SELECT player_name FROM players").unwrap().into_rows();
        assert_eq!(rows.scalar(), Some(&Value::from("Alex")));
    }
}
