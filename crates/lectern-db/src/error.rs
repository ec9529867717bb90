//! Error types for the dialect compatibility layer.

use thiserror::Error;

/// Errors produced by connections, cursors, and the statement translator.
#[derive(Debug, Error)]
pub enum DbError {
    /// The canonical statement uses a construct that cannot be safely
    /// rewritten for the target engine.
    #[error("cannot translate `{construct}` for the target engine: {statement}")]
    Untranslatable {
        /// The construct that has no safe rewrite.
        construct: String,
        /// The offending statement, trimmed.
        statement: String,
    },

    /// The requested backend is not compiled into this build.
    #[error("{backend} backend unavailable: {reason}")]
    BackendUnavailable {
        /// Backend name ("postgres").
        backend: &'static str,
        /// Why the backend cannot be used.
        reason: String,
    },

    /// The embedded engine reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The client-server engine reported an error.
    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    Postgres(#[from] postgres::Error),

    /// A result column could not be decoded into the requested type.
    #[error("cannot decode column `{column}`: {detail}")]
    Decode {
        /// Column name, or `#<index>` for positional access.
        column: String,
        /// What went wrong.
        detail: String,
    },

    /// Filesystem-level failure (store directories, lock files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// Whether this is the "already exists" / "duplicate column" class that
    /// schema replay tolerates. Schema scripts are replayed across versions
    /// and competing processes, so effects that are already present count as
    /// success there.
    ///
    /// SQLite exposes this class only through the error message text;
    /// PostgreSQL reports it as a SQLSTATE code.
    pub fn is_schema_replay_conflict(&self) -> bool {
        match self {
            DbError::Sqlite(e) => {
                let msg = e.to_string();
                msg.contains("already exists") || msg.contains("duplicate column name")
            }
            #[cfg(feature = "postgres")]
            DbError::Postgres(e) => {
                use postgres::error::SqlState;
                matches!(
                    e.code(),
                    Some(state)
                        if *state == SqlState::DUPLICATE_TABLE
                            || *state == SqlState::DUPLICATE_COLUMN
                            || *state == SqlState::DUPLICATE_OBJECT
                )
            }
            _ => false,
        }
    }

    /// Whether this error means a referenced column does not exist. Used by
    /// identity synthesis to detect that the speculative `RETURNING` probe
    /// named a column the target table does not have.
    pub fn is_undefined_column(&self) -> bool {
        match self {
            DbError::Sqlite(e) => {
                let msg = e.to_string();
                msg.contains("no such column") || msg.contains("has no column named")
            }
            #[cfg(feature = "postgres")]
            DbError::Postgres(e) => {
                use postgres::error::SqlState;
                matches!(e.code(), Some(state) if *state == SqlState::UNDEFINED_COLUMN)
            }
            _ => false,
        }
    }
}
