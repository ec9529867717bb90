//! Client-server backend.
//!
//! Statements arrive in the canonical dialect and are rewritten by
//! [`crate::translate`] before they reach the wire. Two things need extra
//! machinery that the embedded engine gets for free:
//!
//! - **Identity synthesis**: the driver does not return a rowid, so a plain
//!   `INSERT` gains a speculative `RETURNING <id-column>` clause. The probe
//!   runs inside a savepoint — on this engine any statement error poisons
//!   the enclosing transaction, and a missing identity column must degrade
//!   to "identity absent", not corrupt the write.
//! - **Schema replay**: each script statement runs inside its own savepoint
//!   for the same reason, so a tolerated "already exists" failure leaves
//!   the transaction usable for the rest of the script.

use std::sync::Arc;

use postgres::types::{ToSql, Type};
use postgres::{Client, NoTls};

use crate::connection::{DialectConnection, ScriptMode};
use crate::error::DbError;
use crate::factory::IdentityColumns;
use crate::row::{Cursor, Row};
use crate::script::split_statements;
use crate::translate::{has_returning, insert_target, translate_script_statement, translate_statement};
use crate::value::Value;

/// A connection to the client-server engine.
pub struct PgConnection {
    client: Client,
    in_txn: bool,
    identity: IdentityColumns,
}

impl PgConnection {
    pub(crate) fn connect(url: &str, identity: IdentityColumns) -> Result<Self, DbError> {
        let client = Client::connect(url, NoTls)?;
        Ok(Self {
            client,
            in_txn: false,
            identity,
        })
    }

    fn begin_if_needed(&mut self) -> Result<(), DbError> {
        if !self.in_txn {
            self.client.batch_execute("BEGIN")?;
            self.in_txn = true;
        }
        Ok(())
    }

    fn insert_with_identity(
        &mut self,
        translated: &str,
        params: &[&(dyn ToSql + Sync)],
        id_column: &str,
    ) -> Result<Cursor, DbError> {
        self.client.batch_execute("SAVEPOINT lectern_identity")?;
        let probe = format!("{translated} RETURNING {id_column}");
        match self.client.query(probe.as_str(), params) {
            Ok(rows) => {
                self.client
                    .batch_execute("RELEASE SAVEPOINT lectern_identity")?;
                let inserted = match rows.first() {
                    Some(row) => match decode_value(row, 0)? {
                        Value::Integer(id) => Some(id),
                        _ => None,
                    },
                    None => None,
                };
                // With ON CONFLICT DO NOTHING a skipped duplicate returns no
                // row, which correctly reports zero rows affected.
                Ok(Cursor::from_write(rows.len() as u64, inserted))
            }
            Err(e) => {
                let err = DbError::from(e);
                if err.is_undefined_column() {
                    self.client
                        .batch_execute("ROLLBACK TO SAVEPOINT lectern_identity")?;
                    let affected = self.client.execute(translated, params)?;
                    Ok(Cursor::from_write(affected, None))
                } else {
                    Err(err)
                }
            }
        }
    }
}

impl DialectConnection for PgConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Cursor, DbError> {
        let translated = translate_statement(sql)?;
        self.begin_if_needed()?;

        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        if !has_returning(&translated) {
            if let Some(table) = insert_target(&translated) {
                if let Some(id_column) = self.identity.column_for(&table) {
                    let id_column = id_column.to_string();
                    return self.insert_with_identity(&translated, &param_refs, &id_column);
                }
                let affected = self.client.execute(translated.as_str(), &param_refs)?;
                return Ok(Cursor::from_write(affected, None));
            }
        }

        let stmt = self.client.prepare(&translated)?;
        if stmt.columns().is_empty() {
            let affected = self.client.execute(&stmt, &param_refs)?;
            Ok(Cursor::from_write(affected, None))
        } else {
            let columns: Arc<[String]> = stmt
                .columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect::<Vec<_>>()
                .into();
            let width = columns.len();

            let rows = self.client.query(&stmt, &param_refs)?;
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                let mut values = Vec::with_capacity(width);
                for idx in 0..width {
                    values.push(decode_value(row, idx)?);
                }
                out.push(Row::new(Arc::clone(&columns), values));
            }
            Ok(Cursor::from_rows(out))
        }
    }

    fn execute_script(&mut self, script: &str, mode: ScriptMode) -> Result<(), DbError> {
        self.begin_if_needed()?;
        for statement in split_statements(script) {
            let translated = match translate_script_statement(&statement)? {
                Some(translated) => translated,
                // PRAGMA directives have no counterpart here.
                None => continue,
            };

            self.client.batch_execute("SAVEPOINT lectern_script")?;
            match self.client.batch_execute(&translated) {
                Ok(()) => {
                    self.client
                        .batch_execute("RELEASE SAVEPOINT lectern_script")?;
                }
                Err(e) => {
                    let err = DbError::from(e);
                    if mode == ScriptMode::Schema && err.is_schema_replay_conflict() {
                        self.client
                            .batch_execute("ROLLBACK TO SAVEPOINT lectern_script")?;
                        tracing::debug!(error = %err, "schema statement already applied, skipping");
                        continue;
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        if self.in_txn {
            self.client.batch_execute("COMMIT")?;
            self.in_txn = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        if self.in_txn {
            self.client.batch_execute("ROLLBACK")?;
            self.in_txn = false;
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn decode_value(row: &postgres::Row, idx: usize) -> Result<Value, DbError> {
    let column = &row.columns()[idx];
    let ty = column.type_();

    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?
            .map(|b| Value::Integer(i64::from(b)))
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?
            .map(|i| Value::Integer(i64::from(i)))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?
            .map(|i| Value::Integer(i64::from(i)))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(Value::Integer)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?
            .map(|r| Value::Real(f64::from(r)))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(Value::Real)
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        row.try_get::<_, Option<String>>(idx)?.map(Value::Text)
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::Blob)
    } else {
        return Err(DbError::Decode {
            column: column.name().to_string(),
            detail: format!("unsupported column type {ty}"),
        });
    };

    Ok(value.unwrap_or(Value::Null))
}
