//! Cross-process migration lock for the single-file backend.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::MigrateError;

/// Exclusive advisory lock held across a whole migration pass.
///
/// The sentinel file lives next to the single-file store
/// (`<store>.migrate.lock`) and, together with the `schema_version` table,
/// is the only cross-process shared resource in this layer. Acquisition
/// blocks until the holder finishes; the guard releases the lock on drop,
/// unconditionally, and leaves the file in place.
///
/// The client-server backend does not use this — the engine's own
/// concurrency control plus idempotent-tolerant replay let racing processes
/// converge without it.
pub struct MigrationLock {
    file: File,
    path: PathBuf,
}

impl MigrationLock {
    /// Opens (creating if needed) the sentinel file and blocks until the
    /// exclusive lock is held.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Lock` if the file cannot be opened or locked.
    pub fn acquire(path: PathBuf) -> Result<Self, MigrateError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| MigrateError::Lock {
                    path: path.clone(),
                    source,
                })?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| MigrateError::Lock {
                path: path.clone(),
                source,
            })?;
        file.lock_exclusive().map_err(|source| MigrateError::Lock {
            path: path.clone(),
            source,
        })?;
        Ok(Self { file, path })
    }

    /// The sentinel path this guard holds.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release migration lock");
        }
    }
}
