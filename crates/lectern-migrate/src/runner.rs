//! Applies unapplied migrations exactly once, safe under concurrent boot.

use std::collections::HashSet;

use lectern_db::{ConnectionFactory, DialectConnection, ScriptMode, Value};

use crate::error::MigrateError;
use crate::lock::MigrationLock;
use crate::registry::{Migration, Registry};

// Portable across both engines; `applied_at` travels as RFC 3339 text bound
// as a parameter so neither engine's time functions are involved.
const VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
)";

const RECORD_VERSION: &str =
    "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, ?)";

/// Runs every unapplied migration in ascending version order.
///
/// For a file-backed store the whole pass holds the exclusive advisory lock,
/// fully serializing concurrent processes. Returns how many migrations this
/// pass applied.
///
/// # Errors
///
/// Any non-tolerated script failure aborts with
/// [`MigrateError::Migration`] naming the offending version; the caller
/// must treat that as fatal and keep the process out of service.
pub fn run_migrations(
    factory: &ConnectionFactory,
    registry: &Registry,
) -> Result<usize, MigrateError> {
    let _lock = acquire_lock(factory)?;
    let mut conn = factory.connect()?;
    apply_pending(conn.as_mut(), registry)
}

/// Reads the set of already-applied versions (the import sentinel included).
///
/// # Errors
///
/// Returns `MigrateError::History` if the history table cannot be read.
pub fn applied_versions(
    conn: &mut dyn DialectConnection,
) -> Result<HashSet<i64>, MigrateError> {
    let mut cursor = conn
        .execute("SELECT version FROM schema_version", &[])
        .map_err(MigrateError::History)?;
    cursor
        .fetch_all()
        .iter()
        .map(|row| row.get::<i64>("version").map_err(MigrateError::History))
        .collect()
}

pub(crate) fn acquire_lock(
    factory: &ConnectionFactory,
) -> Result<Option<MigrationLock>, MigrateError> {
    factory.lock_path().map(MigrationLock::acquire).transpose()
}

pub(crate) fn ensure_version_table(conn: &mut dyn DialectConnection) -> Result<(), MigrateError> {
    conn.execute_script(VERSION_TABLE, ScriptMode::Schema)
        .map_err(MigrateError::History)?;
    conn.commit().map_err(MigrateError::History)?;
    Ok(())
}

/// Applies one migration and records it in the history, atomically.
pub(crate) fn apply_one(
    conn: &mut dyn DialectConnection,
    migration: &Migration,
) -> Result<(), MigrateError> {
    let version = migration.version;
    tracing::info!(version, "applying migration");

    conn.execute_script(migration.script, ScriptMode::Schema)
        .map_err(|source| MigrateError::Migration { version, source })?;
    conn.execute(
        RECORD_VERSION,
        &[
            Value::from(version),
            Value::from(chrono::Utc::now().to_rfc3339()),
        ],
    )
    .map_err(|source| MigrateError::Migration { version, source })?;
    conn.commit()
        .map_err(|source| MigrateError::Migration { version, source })?;
    Ok(())
}

/// Ensures the history table, then applies everything still pending, in
/// ascending order. Shared by the standalone runner and the boot sequence;
/// takes no lock itself.
pub(crate) fn apply_pending(
    conn: &mut dyn DialectConnection,
    registry: &Registry,
) -> Result<usize, MigrateError> {
    ensure_version_table(conn)?;
    let applied = applied_versions(conn)?;

    let mut count = 0;
    for migration in registry.iter() {
        if applied.contains(&migration.version) {
            tracing::debug!(version = migration.version, "migration already applied, skipping");
            continue;
        }
        if let Err(e) = apply_one(conn, migration) {
            let _ = conn.rollback();
            return Err(e);
        }
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_db::SqliteConnection;

    fn memory_conn() -> SqliteConnection {
        SqliteConnection::open_in_memory().expect("should open in-memory db")
    }

    fn history(conn: &mut dyn DialectConnection) -> Vec<i64> {
        let mut cursor = conn
            .execute("SELECT version FROM schema_version ORDER BY version", &[])
            .expect("should read history");
        cursor
            .fetch_all()
            .iter()
            .map(|row| row.get::<i64>("version").expect("should decode version"))
            .collect()
    }

    #[test]
    fn fresh_store_applies_everything() {
        let mut conn = memory_conn();
        let registry = Registry::builtin();
        let applied = apply_pending(&mut conn, &registry).expect("should migrate");
        assert_eq!(applied, registry.len());
        assert_eq!(history(&mut conn), vec![1, 2, 3, 5]);
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut conn = memory_conn();
        let registry = Registry::builtin();
        apply_pending(&mut conn, &registry).expect("first pass should migrate");
        let before = history(&mut conn);

        let applied = apply_pending(&mut conn, &registry).expect("second pass should succeed");
        assert_eq!(applied, 0);
        assert_eq!(history(&mut conn), before);
    }

    #[test]
    fn gaps_in_the_version_sequence_are_preserved() {
        let mut conn = memory_conn();
        let registry = Registry::new(vec![
            Migration {
                version: 1,
                script: "CREATE TABLE IF NOT EXISTS a (id INTEGER PRIMARY KEY AUTOINCREMENT)",
            },
            Migration {
                version: 5,
                script: "CREATE TABLE IF NOT EXISTS b (id INTEGER PRIMARY KEY AUTOINCREMENT)",
            },
            Migration {
                version: 7,
                script: "CREATE TABLE IF NOT EXISTS c (id INTEGER PRIMARY KEY AUTOINCREMENT)",
            },
        ])
        .expect("registry should validate");

        apply_pending(&mut conn, &registry).expect("should migrate");
        assert_eq!(history(&mut conn), vec![1, 5, 7]);
    }

    #[test]
    fn failure_names_the_offending_version() {
        let mut conn = memory_conn();
        let registry = Registry::new(vec![
            Migration {
                version: 1,
                script: "CREATE TABLE IF NOT EXISTS a (id INTEGER PRIMARY KEY AUTOINCREMENT)",
            },
            Migration {
                version: 2,
                script: "CREATE TABLE broken (id INTEGER REFERENCES nowhere(id) ON TYPO)",
            },
        ])
        .expect("registry should validate");

        let err = apply_pending(&mut conn, &registry).expect_err("bad script should abort");
        match err {
            MigrateError::Migration { version, .. } => assert_eq!(version, 2),
            other => panic!("unexpected error: {other}"),
        }
        // Version 1 committed before the failure; 2 must not be recorded.
        assert_eq!(history(&mut conn), vec![1]);
    }

    #[test]
    fn replayed_scripts_tolerate_existing_objects() {
        let mut conn = memory_conn();
        let registry = Registry::builtin();
        apply_pending(&mut conn, &registry).expect("should migrate");

        // Wipe only the history: the next pass replays every script against
        // the already-built schema and must converge instead of failing.
        conn.execute("DELETE FROM schema_version", &[])
            .expect("should clear history");
        conn.commit().expect("should commit");

        let applied = apply_pending(&mut conn, &registry).expect("replay should converge");
        assert_eq!(applied, registry.len());
        assert_eq!(history(&mut conn), vec![1, 2, 3, 5]);
    }
}
