//! The backend-neutral connection surface.

use crate::error::DbError;
use crate::row::Cursor;
use crate::value::Value;

/// How a multi-statement script should treat failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptMode {
    /// Schema replay: a statement failing with the "already exists" /
    /// "duplicate column" class is logged and skipped, because schema
    /// scripts are re-run across versions and competing processes. Any
    /// other failure aborts the script.
    Schema,
    /// Every failure aborts the script.
    Strict,
}

/// Uniform execute/fetch/commit surface over one native driver handle.
///
/// A connection owns exactly one handle and lives for one logical unit of
/// work — one request or one script run. It is not `Send`: it is never
/// shared across threads. Dropping the connection closes the native handle;
/// an uncommitted transaction is rolled back by the engine.
pub trait DialectConnection {
    /// Runs one canonical-dialect statement, reads and writes alike.
    ///
    /// For writes, the returned cursor carries `rows_affected` and a
    /// synthesized `inserted_id` where the backend could produce one;
    /// identity-synthesis misses surface as `inserted_id() == None`, never
    /// as an error.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Cursor, DbError>;

    /// Splits `script` on statement boundaries and executes sequentially,
    /// honoring `mode` for failure handling.
    fn execute_script(&mut self, script: &str, mode: ScriptMode) -> Result<(), DbError>;

    /// Commits the open transaction, if any.
    fn commit(&mut self) -> Result<(), DbError>;

    /// Rolls back the open transaction, if any.
    fn rollback(&mut self) -> Result<(), DbError>;

    /// Short backend name for logs ("sqlite", "postgres").
    fn backend_name(&self) -> &'static str;
}
