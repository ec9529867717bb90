use std::collections::HashMap;

use lectern_db::{ConnectionFactory, Value};
use lectern_migrate::{prepare_store, run_migrations, Registry, IMPORT_SENTINEL};

fn history_counts(factory: &ConnectionFactory) -> HashMap<i64, i64> {
    let mut conn = factory.connect().expect("failed to connect");
    let mut cursor = conn
        .execute(
            "SELECT version, COUNT(*) AS n FROM schema_version GROUP BY version",
            &[],
        )
        .expect("failed to read history");
    cursor
        .fetch_all()
        .iter()
        .map(|row| {
            (
                row.get::<i64>("version").expect("failed to decode version"),
                row.get::<i64>("n").expect("failed to decode count"),
            )
        })
        .collect()
}

#[test]
fn store_initialization_works() {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let store = dir.path().join("lectern.db");
    let legacy_dir = dir.path().join("legacy");

    let factory = ConnectionFactory::new(store.to_str().expect("utf-8 path"));
    let registry = Registry::builtin();

    let report = prepare_store(&factory, &registry, &legacy_dir).expect("failed to prepare store");
    assert_eq!(report.migrations_applied, registry.len());

    let counts = history_counts(&factory);
    for version in [IMPORT_SENTINEL, 1, 2, 3, 5] {
        assert_eq!(counts.get(&version), Some(&1), "version {version}");
    }

    // The application schema is in place and usable through the dialect layer.
    let mut conn = factory.connect().expect("failed to connect");
    let cursor = conn
        .execute(
            "INSERT INTO profiles (username, created_at) VALUES (?, ?)",
            &[Value::from("ada"), Value::from("2024-03-01T10:00:00Z")],
        )
        .expect("failed to insert profile");
    assert_eq!(cursor.inserted_id(), Some(1));
    conn.commit().expect("failed to commit");
}

#[test]
fn migrating_twice_yields_an_identical_history() {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let store = dir.path().join("lectern.db");
    let factory = ConnectionFactory::new(store.to_str().expect("utf-8 path"));
    let registry = Registry::builtin();

    let first = run_migrations(&factory, &registry).expect("first pass failed");
    assert_eq!(first, registry.len());
    let before = history_counts(&factory);

    let second = run_migrations(&factory, &registry).expect("second pass failed");
    assert_eq!(second, 0);
    assert_eq!(history_counts(&factory), before);
}

#[test]
fn concurrent_boots_converge_without_duplicates() {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let store = dir.path().join("lectern.db");
    let url = store.to_str().expect("utf-8 path").to_string();
    let registry_len = Registry::builtin().len();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let url = url.clone();
            std::thread::spawn(move || {
                let factory = ConnectionFactory::new(&url);
                run_migrations(&factory, &Registry::builtin())
            })
        })
        .collect();

    let mut total_applied = 0;
    for handle in handles {
        let applied = handle
            .join()
            .expect("runner thread panicked")
            .expect("concurrent runner failed");
        total_applied += applied;
    }

    // The advisory lock serializes the two passes: one applies everything,
    // the other finds nothing left, and the history holds each version
    // exactly once.
    assert_eq!(total_applied, registry_len);
    let factory = ConnectionFactory::new(&url);
    let counts = history_counts(&factory);
    for version in [1, 2, 3, 5] {
        assert_eq!(counts.get(&version), Some(&1), "version {version}");
    }
}

/// End-to-end pass against a real client-server store. Needs a reachable
/// database, e.g. `LECTERN_PG_TEST_URL=postgres://app@localhost/lectern_test`.
#[test]
#[ignore = "needs a running postgres; set LECTERN_PG_TEST_URL"]
fn postgres_end_to_end() {
    let url = std::env::var("LECTERN_PG_TEST_URL").expect("LECTERN_PG_TEST_URL must be set");
    let dir = tempfile::tempdir().expect("failed to create tempdir");

    let factory = ConnectionFactory::new(&url);
    let registry = Registry::builtin();

    prepare_store(&factory, &registry, dir.path()).expect("failed to prepare store");
    let second = run_migrations(&factory, &registry).expect("second pass failed");
    assert_eq!(second, 0);

    let mut conn = factory.connect().expect("failed to connect");
    let cursor = conn
        .execute(
            "INSERT OR IGNORE INTO profiles (username, created_at) VALUES (?, ?)",
            &[Value::from("pg-probe"), Value::from("2024-03-01T10:00:00Z")],
        )
        .expect("failed to insert profile");
    let first_id = cursor.inserted_id();
    assert!(first_id.is_some());

    let cursor = conn
        .execute(
            "INSERT OR IGNORE INTO profiles (username, created_at) VALUES (?, ?)",
            &[Value::from("pg-probe"), Value::from("2024-03-01T10:00:00Z")],
        )
        .expect("duplicate insert should be ignored");
    assert_eq!(cursor.rows_affected(), 0);
    assert_eq!(cursor.inserted_id(), None);
    conn.rollback().expect("failed to roll back probe rows");
}
