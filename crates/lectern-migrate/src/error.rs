//! Error types for the schema lifecycle.

use std::path::PathBuf;

use lectern_db::DbError;
use thiserror::Error;

/// Errors that can occur while bringing a store up to date.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// A migration script (or its history insert) failed with a
    /// non-tolerated error. Startup must abort; the store may be partially
    /// migrated and must not serve traffic.
    #[error("migration {version} failed: {source}")]
    Migration {
        /// The offending schema version.
        version: i64,
        /// The underlying database error.
        source: DbError,
    },

    /// The migration history could not be read or created.
    #[error("failed to read schema history: {0}")]
    History(DbError),

    /// The cross-process migration lock could not be acquired.
    #[error("could not acquire migration lock at {path}: {source}")]
    Lock {
        /// The sentinel lock path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The legacy import hit a database error. Malformed legacy records are
    /// skipped, never fatal — this is for real driver failures.
    #[error("legacy import failed: {0}")]
    Legacy(DbError),

    /// The migration list itself is malformed.
    #[error("invalid migration registry: {0}")]
    Registry(String),

    /// Any other database-layer failure.
    #[error(transparent)]
    Db(#[from] DbError),
}
