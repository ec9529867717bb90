//! The boot contract: bring a store up to date before serving traffic.

use std::path::Path;

use lectern_db::ConnectionFactory;

use crate::error::MigrateError;
use crate::legacy::{self, ImportReport};
use crate::registry::Registry;
use crate::runner;

/// What one boot pass did to the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BootReport {
    /// Migrations applied this pass (the base version included).
    pub migrations_applied: usize,
    /// Legacy-import outcome; `None` when a previous boot already imported.
    pub legacy: Option<ImportReport>,
}

/// Brings the store fully up to date: history table, base schema, one-time
/// legacy import, then every remaining migration, in that order.
///
/// The base schema is applied before the import because legacy records land
/// in its tables; it goes through the same tolerant replay path as any
/// other migration, so a store that already has it simply converges.
///
/// For a file-backed store the whole sequence holds the exclusive advisory
/// lock. Any error is fatal to the boot — the caller must not serve traffic
/// over a store this function failed on.
pub fn prepare_store(
    factory: &ConnectionFactory,
    registry: &Registry,
    legacy_dir: &Path,
) -> Result<BootReport, MigrateError> {
    let _lock = runner::acquire_lock(factory)?;
    let mut conn = factory.connect()?;
    let conn = conn.as_mut();

    let mut report = BootReport::default();

    runner::ensure_version_table(conn)?;

    if let Some(base) = registry.base() {
        let applied = runner::applied_versions(conn)?;
        if !applied.contains(&base.version) {
            if let Err(e) = runner::apply_one(conn, base) {
                let _ = conn.rollback();
                return Err(e);
            }
            report.migrations_applied += 1;
        }
    }

    match legacy::import_legacy(conn, legacy_dir) {
        Ok(outcome) => report.legacy = outcome,
        Err(e) => {
            let _ = conn.rollback();
            return Err(e);
        }
    }

    report.migrations_applied += runner::apply_pending(conn, registry)?;

    tracing::info!(
        backend = factory.backend_name(),
        applied = report.migrations_applied,
        imported = report.legacy.is_some(),
        "store is up to date"
    );
    Ok(report)
}
