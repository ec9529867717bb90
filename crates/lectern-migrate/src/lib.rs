//! Schema lifecycle for the Lectern store.
//!
//! Owns everything between "a connection string" and "a store the
//! application may serve traffic against": versioned migrations tracked in
//! the `schema_version` table, a one-time import of pre-relational
//! flat-file records, and the cross-process safety that lets several server
//! processes boot concurrently against the same store.
//!
//! # Design decisions
//!
//! - **Embedded migrations**: SQL scripts are compiled into the binary via
//!   `include_str!`, so migrations ship with the code that depends on them
//!   and cannot drift.
//! - **Idempotent-tolerant replay**: schema scripts run through
//!   [`lectern_db::ScriptMode::Schema`], where effects that already exist
//!   count as success. Combined with a duplicate-tolerant history insert,
//!   this is what lets two racing processes on the client-server backend
//!   both converge without explicit locking. The single-file backend is
//!   serialized outright by an advisory file lock.
//! - **Fatal on anything else**: a migration failure aborts startup with
//!   the offending version in the error. A partially migrated store must
//!   never serve traffic; rollback is an operational action, not something
//!   this layer improvises.

mod bootstrap;
mod error;
mod legacy;
mod lock;
mod registry;
mod runner;

pub use bootstrap::{prepare_store, BootReport};
pub use error::MigrateError;
pub use legacy::{import_legacy, ImportReport, IMPORT_SENTINEL};
pub use lock::MigrationLock;
pub use registry::{Migration, Registry};
pub use runner::{applied_versions, run_migrations};
