//! Dialect compatibility layer for the Lectern persistence stack.
//!
//! Every other part of the application issues one canonical dialect of SQL —
//! `?` positional placeholders, `INSERT OR IGNORE INTO`, SQLite-style
//! identity DDL — and runs unmodified against either an embedded single-file
//! engine (SQLite) or a client-server engine (PostgreSQL). This crate owns
//! that uniformity: statement translation, a backend-neutral connection
//! trait, buffered result rows that behave identically over both drivers,
//! and the factory that picks a backend from one configuration string.
//!
//! # Design decisions
//!
//! - **One connection per unit of work**: a [`DialectConnection`] wraps
//!   exactly one native handle, lives for one request or one script run, and
//!   is never shared across threads. Pooling, if the host wants it, sits
//!   behind [`ConnectionFactory`].
//! - **Fail-loud translation**: a canonical construct with no safe
//!   PostgreSQL rewrite is an error at the issuing call site, never a
//!   best-effort partial rewrite that could silently change meaning.
//! - **Optional client-server backend**: the `postgres` cargo feature (on by
//!   default) compiles the PostgreSQL path. Without it the factory still
//!   parses connection strings; requesting that backend fails only at first
//!   use, with [`DbError::BackendUnavailable`].

mod connection;
mod error;
mod factory;
#[cfg(feature = "postgres")]
mod pg;
mod row;
mod script;
mod sqlite;
pub mod translate;
mod value;

pub use connection::{DialectConnection, ScriptMode};
pub use error::DbError;
pub use factory::{ConnectionFactory, IdentityColumns};
#[cfg(feature = "postgres")]
pub use pg::PgConnection;
pub use row::{Cursor, FromValue, Row};
pub use sqlite::SqliteConnection;
pub use value::Value;
