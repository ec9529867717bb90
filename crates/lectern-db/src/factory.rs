//! Backend selection from one configuration string.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::connection::DialectConnection;
use crate::error::DbError;
use crate::sqlite::SqliteConnection;

/// Explicit table → identity-column registry for identity synthesis.
///
/// Tables default to an `id` column. Tables whose key is something else
/// register an override; tables with no synthesized identity at all (the
/// migration history, keyed lookup tables) opt out, which skips the
/// speculative `RETURNING` probe entirely.
#[derive(Debug, Clone)]
pub struct IdentityColumns {
    overrides: HashMap<String, Option<String>>,
}

impl Default for IdentityColumns {
    fn default() -> Self {
        let mut overrides = HashMap::new();
        // The migration history is keyed by version; it never has a
        // synthesized identity.
        overrides.insert("schema_version".to_string(), None);
        Self { overrides }
    }
}

impl IdentityColumns {
    /// Registers a non-default identity column for a table.
    pub fn with(mut self, table: &str, column: &str) -> Self {
        self.overrides
            .insert(table.to_ascii_lowercase(), Some(column.to_string()));
        self
    }

    /// Marks a table as having no synthesized identity.
    pub fn without(mut self, table: &str) -> Self {
        self.overrides.insert(table.to_ascii_lowercase(), None);
        self
    }

    /// The identity column to probe for a table, or `None` to skip.
    pub fn column_for(&self, table: &str) -> Option<&str> {
        match self.overrides.get(&table.to_ascii_lowercase()) {
            Some(Some(column)) => Some(column.as_str()),
            Some(None) => None,
            None => Some("id"),
        }
    }
}

#[derive(Debug, Clone)]
enum Target {
    Memory,
    File(PathBuf),
    Postgres(String),
}

/// Chooses a backend from one configuration string and opens connections
/// against it.
///
/// A recognized client-server scheme (`postgres://`, `postgresql://`)
/// selects the network path; anything else is a filesystem path for the
/// single-file backend (`:memory:` opens a private in-memory store).
///
/// Construction never fails — a client-server target in a build without the
/// `postgres` feature is reported as [`DbError::BackendUnavailable`] only
/// when a connection is actually requested.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    target: Target,
    identity: IdentityColumns,
}

impl ConnectionFactory {
    pub fn new(url: &str) -> Self {
        let target = if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Target::Postgres(url.to_string())
        } else if url == ":memory:" {
            Target::Memory
        } else {
            Target::File(PathBuf::from(url))
        };
        Self {
            target,
            identity: IdentityColumns::default(),
        }
    }

    /// Replaces the identity-column registry handed to new connections.
    pub fn with_identity_columns(mut self, identity: IdentityColumns) -> Self {
        self.identity = identity;
        self
    }

    /// Opens one connection for one unit of work.
    pub fn connect(&self) -> Result<Box<dyn DialectConnection>, DbError> {
        match &self.target {
            Target::Memory => Ok(Box::new(SqliteConnection::open_in_memory()?)),
            Target::File(path) => Ok(Box::new(SqliteConnection::open(path)?)),
            Target::Postgres(_url) => {
                #[cfg(feature = "postgres")]
                {
                    Ok(Box::new(crate::pg::PgConnection::connect(
                        _url,
                        self.identity.clone(),
                    )?))
                }
                #[cfg(not(feature = "postgres"))]
                {
                    Err(DbError::BackendUnavailable {
                        backend: "postgres",
                        reason: "this build does not include the `postgres` feature".to_string(),
                    })
                }
            }
        }
    }

    /// Whether the target is the embedded single-file backend on disk.
    pub fn is_single_file(&self) -> bool {
        matches!(self.target, Target::File(_))
    }

    /// Short backend name for logs.
    pub fn backend_name(&self) -> &'static str {
        match self.target {
            Target::Memory | Target::File(_) => "sqlite",
            Target::Postgres(_) => "postgres",
        }
    }

    /// Sentinel path for the cross-process migration lock, derived from the
    /// store's location. Only file-backed stores need one: an in-memory
    /// store is process-private and the client-server engine brings its own
    /// concurrency control.
    pub fn lock_path(&self) -> Option<PathBuf> {
        match &self.target {
            Target::File(path) => {
                let mut os = path.clone().into_os_string();
                os.push(".migrate.lock");
                Some(PathBuf::from(os))
            }
            _ => None,
        }
    }

    /// The filesystem path of a single-file target, if that is what the
    /// configuration string named.
    pub fn file_path(&self) -> Option<&Path> {
        match &self.target {
            Target::File(path) => Some(path),
            _ => None,
        }
    }
}
