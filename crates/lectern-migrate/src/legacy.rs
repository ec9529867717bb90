//! One-time import of pre-relational flat-file records.
//!
//! Early Lectern deployments kept user data in per-collection JSON files.
//! The import runs once, before the migration pass, and is gated by a
//! reserved `schema_version` row. Every insert is duplicate-tolerant, so an
//! interrupted import is safe to re-run from the top.

use std::path::{Path, PathBuf};

use lectern_db::{DialectConnection, Value};
use serde::Deserialize;

use crate::error::MigrateError;

/// Reserved `schema_version` marker: the legacy import has completed.
pub const IMPORT_SENTINEL: i64 = -1;

const PROFILES_FILE: &str = "profiles.json";
const ACTIVITY_FILE: &str = "activity.json";

/// What one import pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    /// Profile records handed to the store.
    pub profiles: usize,
    /// Activity-log records handed to the store.
    pub activity: usize,
    /// Records skipped because they failed to parse.
    pub skipped_records: usize,
}

// Legacy records are parsed defensively: only the natural key is required,
// everything else falls back to a safe default.

#[derive(Debug, Deserialize)]
struct LegacyProfile {
    username: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    points: i64,
    #[serde(default)]
    streak: i64,
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyActivity {
    username: String,
    #[serde(default = "unknown_kind")]
    kind: String,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    points: i64,
    #[serde(default)]
    occurred_at: Option<String>,
}

fn unknown_kind() -> String {
    "unknown".to_string()
}

/// Imports the known legacy collections from `dir`, once.
///
/// Returns `None` when the sentinel shows a previous import already
/// completed. A missing collection file skips only that collection; the
/// sentinel is written either way, so a store born without legacy files is
/// permanently marked done.
///
/// Consumed files are renamed with an `.imported` suffix afterwards,
/// best-effort — a rename failure is logged, not fatal.
///
/// # Errors
///
/// Returns `MigrateError::Legacy` on a real database failure. Malformed
/// files and records are skipped, never fatal.
pub fn import_legacy(
    conn: &mut dyn DialectConnection,
    dir: &Path,
) -> Result<Option<ImportReport>, MigrateError> {
    if sentinel_present(conn)? {
        return Ok(None);
    }

    let mut report = ImportReport::default();
    let now = chrono::Utc::now().to_rfc3339();

    let profiles_path = dir.join(PROFILES_FILE);
    for raw in read_collection(&profiles_path) {
        match serde_json::from_value::<LegacyProfile>(raw) {
            Ok(profile) => {
                insert_profile(conn, &profile, &now)?;
                report.profiles += 1;
            }
            Err(e) => {
                tracing::warn!(file = PROFILES_FILE, error = %e, "skipping malformed legacy record");
                report.skipped_records += 1;
            }
        }
    }

    let activity_path = dir.join(ACTIVITY_FILE);
    for raw in read_collection(&activity_path) {
        match serde_json::from_value::<LegacyActivity>(raw) {
            Ok(activity) => {
                insert_activity(conn, &activity, &now)?;
                report.activity += 1;
            }
            Err(e) => {
                tracing::warn!(file = ACTIVITY_FILE, error = %e, "skipping malformed legacy record");
                report.skipped_records += 1;
            }
        }
    }

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, ?)",
        &[Value::from(IMPORT_SENTINEL), Value::from(now)],
    )
    .map_err(MigrateError::Legacy)?;
    conn.commit().map_err(MigrateError::Legacy)?;

    mark_consumed(&profiles_path);
    mark_consumed(&activity_path);

    tracing::info!(
        profiles = report.profiles,
        activity = report.activity,
        skipped = report.skipped_records,
        "legacy import complete"
    );
    Ok(Some(report))
}

fn sentinel_present(conn: &mut dyn DialectConnection) -> Result<bool, MigrateError> {
    let mut cursor = conn
        .execute(
            "SELECT version FROM schema_version WHERE version = ?",
            &[Value::from(IMPORT_SENTINEL)],
        )
        .map_err(MigrateError::Legacy)?;
    Ok(cursor.fetch_one().is_some())
}

/// Reads one collection file as an array of raw records. Anything that
/// prevents reading the array — absent file, unreadable file, non-array
/// payload — skips the whole collection.
fn read_collection(path: &Path) -> Vec<serde_json::Value> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no legacy file, skipping collection");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable legacy file, skipping collection");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<serde_json::Value>>(&text) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "legacy file is not an array of records, skipping collection");
            Vec::new()
        }
    }
}

fn insert_profile(
    conn: &mut dyn DialectConnection,
    profile: &LegacyProfile,
    now: &str,
) -> Result<(), MigrateError> {
    conn.execute(
        "INSERT OR IGNORE INTO profiles
            (username, display_name, email, points, streak, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        &[
            Value::from(profile.username.as_str()),
            Value::from(profile.display_name.clone()),
            Value::from(profile.email.clone()),
            Value::from(profile.points),
            Value::from(profile.streak),
            Value::from(profile.created_at.clone().unwrap_or_else(|| now.to_string())),
        ],
    )
    .map_err(MigrateError::Legacy)?;
    Ok(())
}

fn insert_activity(
    conn: &mut dyn DialectConnection,
    activity: &LegacyActivity,
    now: &str,
) -> Result<(), MigrateError> {
    conn.execute(
        "INSERT OR IGNORE INTO activity_log
            (username, kind, detail, points, occurred_at)
         VALUES (?, ?, ?, ?, ?)",
        &[
            Value::from(activity.username.as_str()),
            Value::from(activity.kind.as_str()),
            Value::from(activity.detail.clone()),
            Value::from(activity.points),
            Value::from(activity.occurred_at.clone().unwrap_or_else(|| now.to_string())),
        ],
    )
    .map_err(MigrateError::Legacy)?;
    Ok(())
}

fn mark_consumed(path: &Path) {
    if !path.exists() {
        return;
    }
    let mut renamed = path.as_os_str().to_owned();
    renamed.push(".imported");
    if let Err(e) = std::fs::rename(path, PathBuf::from(&renamed)) {
        tracing::warn!(path = %path.display(), error = %e, "could not rename consumed legacy file");
    }
}
