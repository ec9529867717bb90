//! Embedded single-file backend.
//!
//! The canonical dialect *is* this engine's native dialect, so statements
//! run untranslated. WAL mode allows concurrent readers with a single
//! writer, which matches the one-connection-per-unit-of-work model.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;

use crate::connection::{DialectConnection, ScriptMode};
use crate::error::DbError;
use crate::row::{Cursor, Row};
use crate::script::split_statements;
use crate::translate::insert_target;
use crate::value::Value;

const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
";

/// A connection to the embedded engine.
pub struct SqliteConnection {
    conn: Connection,
    in_txn: bool,
}

impl SqliteConnection {
    /// Opens (creating if needed) a database file, applying the standard
    /// pragmas. Parent directories are created.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// Opens a private in-memory database (used by tests and tooling).
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(PRAGMAS)?;
        Ok(Self {
            conn,
            in_txn: false,
        })
    }

    fn begin_if_needed(&mut self) -> Result<(), DbError> {
        if !self.in_txn {
            self.conn.execute_batch("BEGIN")?;
            self.in_txn = true;
        }
        Ok(())
    }
}

impl DialectConnection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Cursor, DbError> {
        self.begin_if_needed()?;

        let mut stmt = self.conn.prepare(sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        if stmt.column_count() > 0 {
            let columns: Arc<[String]> = stmt
                .column_names()
                .iter()
                .map(|name| name.to_string())
                .collect::<Vec<_>>()
                .into();
            let width = columns.len();

            let mut rows = stmt.query(&param_refs[..])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for idx in 0..width {
                    values.push(Value::from(row.get_ref(idx)?));
                }
                out.push(Row::new(Arc::clone(&columns), values));
            }
            Ok(Cursor::from_rows(out))
        } else {
            let affected = stmt.execute(&param_refs[..])? as u64;
            drop(stmt);

            // The engine returns the last rowid natively; mask it when the
            // statement changed nothing (an ignored duplicate) or nothing
            // was ever inserted on this handle.
            let inserted = if affected > 0 && insert_target(sql).is_some() {
                match self.conn.last_insert_rowid() {
                    0 => None,
                    id => Some(id),
                }
            } else {
                None
            };
            Ok(Cursor::from_write(affected, inserted))
        }
    }

    fn execute_script(&mut self, script: &str, mode: ScriptMode) -> Result<(), DbError> {
        self.begin_if_needed()?;
        for statement in split_statements(script) {
            if let Err(e) = self.conn.execute_batch(&statement) {
                let err = DbError::from(e);
                if mode == ScriptMode::Schema && err.is_schema_replay_conflict() {
                    tracing::debug!(error = %err, "schema statement already applied, skipping");
                    continue;
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        if self.in_txn {
            self.conn.execute_batch("COMMIT")?;
            self.in_txn = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        if self.in_txn {
            self.conn.execute_batch("ROLLBACK")?;
            self.in_txn = false;
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
