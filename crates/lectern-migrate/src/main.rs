//! Lectern store preparation binary.
//!
//! Runs the full boot sequence — legacy import plus migrations — and exits
//! non-zero on failure, so a supervisor never routes traffic to a process
//! whose store is partially migrated. Server processes run the same
//! sequence in-process at startup; this binary exists for operators and
//! deploy pipelines that want the store ready before anything serves.

mod config;

use std::path::Path;

use lectern_db::ConnectionFactory;
use lectern_migrate::{prepare_store, Registry};
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("LECTERN_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — cannot prepare a store without valid config");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let factory = ConnectionFactory::new(&config.database.url);
    let registry = Registry::builtin();

    tracing::info!(backend = factory.backend_name(), "preparing store");

    match prepare_store(&factory, &registry, Path::new(&config.database.legacy_dir)) {
        Ok(report) => {
            if let Some(imported) = report.legacy {
                tracing::info!(
                    profiles = imported.profiles,
                    activity = imported.activity,
                    skipped = imported.skipped_records,
                    "imported legacy records"
                );
            }
            tracing::info!(applied = report.migrations_applied, "store is up to date");
        }
        Err(e) => {
            tracing::error!(error = %e, "store preparation failed; the application must not serve traffic");
            std::process::exit(1);
        }
    }
}
