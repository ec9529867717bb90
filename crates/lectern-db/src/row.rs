//! Buffered result rows with uniform access across backends.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::DbError;
use crate::value::Value;

/// A read-only projection of one result row.
///
/// Column names are shared across all rows of one result set; values sit in
/// a parallel vector. A `Row` holds no reference back to the connection that
/// produced it, so it can outlive the statement and the unit of work.
///
/// Name lookup is ASCII case-insensitive: the client-server engine folds
/// unquoted identifiers to lower case, and call sites must see the same
/// behavior over both backends.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Column names of this row, in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether the result set contains a column with this name.
    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    /// The raw value of a named column, or `None` if the column is absent.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.position(column).map(|idx| &self.values[idx])
    }

    /// The raw value at a position, or `None` if out of range.
    pub fn value_at(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Decodes a named column into a Rust type.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T, DbError> {
        let idx = self.position(column).ok_or_else(|| DbError::Decode {
            column: column.to_string(),
            detail: "no such column in result row".to_string(),
        })?;
        T::from_value(&self.values[idx]).map_err(|detail| DbError::Decode {
            column: column.to_string(),
            detail,
        })
    }

    /// Decodes the column at a position into a Rust type.
    pub fn get_at<T: FromValue>(&self, idx: usize) -> Result<T, DbError> {
        let value = self.values.get(idx).ok_or_else(|| DbError::Decode {
            column: format!("#{idx}"),
            detail: format!("row has {} columns", self.values.len()),
        })?;
        T::from_value(value).map_err(|detail| DbError::Decode {
            column: format!("#{idx}"),
            detail,
        })
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
    }
}

/// Handle over an executed statement: the buffered result set plus write
/// metadata. Buffering is what makes row behavior byte-identical across
/// backends — no driver-side lazy fetch semantics leak through.
#[derive(Debug, Default)]
pub struct Cursor {
    rows: VecDeque<Row>,
    rows_affected: u64,
    inserted_id: Option<i64>,
}

impl Cursor {
    pub(crate) fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into(),
            rows_affected: 0,
            inserted_id: None,
        }
    }

    pub(crate) fn from_write(rows_affected: u64, inserted_id: Option<i64>) -> Self {
        Self {
            rows: VecDeque::new(),
            rows_affected,
            inserted_id,
        }
    }

    /// Takes the next row, if any.
    pub fn fetch_one(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    /// Takes all remaining rows.
    pub fn fetch_all(&mut self) -> Vec<Row> {
        self.rows.drain(..).collect()
    }

    /// Rows changed by a write statement.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Synthesized identity of the inserted row, when the backend produced
    /// one. `None` is not an error: the write happened, the table just has
    /// no identity column (or the insert was a duplicate no-op).
    pub fn inserted_id(&self) -> Option<i64> {
        self.inserted_id
    }
}

/// Decoding from a [`Value`] into a concrete Rust type.
///
/// Implementations return a human-readable detail string on mismatch; the
/// caller wraps it with the column name.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Integer(i) => Ok(*i),
            other => Err(format!("expected integer, found {}", other.kind())),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Real(r) => Ok(*r),
            // Integer-to-real widening mirrors SQLite's numeric affinity.
            Value::Integer(i) => Ok(*i as f64),
            other => Err(format!("expected real, found {}", other.kind())),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(format!("expected text, found {}", other.kind())),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Integer(i) => Ok(*i != 0),
            other => Err(format!("expected integer, found {}", other.kind())),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            other => Err(format!("expected blob, found {}", other.kind())),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string(), "score".to_string()]
            .into();
        Row::new(
            columns,
            vec![
                Value::Integer(7),
                Value::Text("ada".to_string()),
                Value::Null,
            ],
        )
    }

    #[test]
    fn access_by_name_index_and_membership() {
        let row = sample();
        assert_eq!(row.get::<i64>("id").expect("should decode id"), 7);
        assert_eq!(
            row.get_at::<String>(1).expect("should decode name"),
            "ada"
        );
        assert!(row.contains("name"));
        assert!(!row.contains("missing"));
    }

    #[test]
    fn name_lookup_ignores_ascii_case() {
        let row = sample();
        assert_eq!(row.get::<i64>("ID").expect("should decode"), 7);
        assert!(row.contains("NAME"));
    }

    #[test]
    fn null_decodes_to_none() {
        let row = sample();
        assert_eq!(
            row.get::<Option<f64>>("score").expect("should decode null"),
            None
        );
        assert!(row.get::<f64>("score").is_err());
    }

    #[test]
    fn missing_column_is_a_decode_error() {
        let row = sample();
        let err = row.get::<i64>("missing").expect_err("should fail");
        assert!(matches!(err, DbError::Decode { .. }), "got: {err}");
    }

    #[test]
    fn cursor_drains_in_order() {
        let mut cursor = Cursor::from_rows(vec![sample(), sample()]);
        assert!(cursor.fetch_one().is_some());
        assert_eq!(cursor.fetch_all().len(), 1);
        assert!(cursor.fetch_one().is_none());
    }

    #[test]
    fn write_cursor_reports_metadata() {
        let cursor = Cursor::from_write(1, Some(42));
        assert_eq!(cursor.rows_affected(), 1);
        assert_eq!(cursor.inserted_id(), Some(42));
    }
}
