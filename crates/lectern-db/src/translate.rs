//! Canonical-dialect statement translation for the client-server engine.
//!
//! Application call sites write one dialect: `?` positional placeholders,
//! `INSERT OR IGNORE INTO`, SQLite-style identity DDL, inline `PRAGMA`
//! directives. The embedded engine executes that dialect natively; the
//! functions here rewrite it into PostgreSQL syntax. A construct with no
//! safe rewrite is an error — a partial rewrite that could silently change
//! meaning is worse than a loud failure.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::DbError;

static INSERT_CONFLICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^INSERT\s+OR\s+([A-Za-z]+)\s+INTO\s+").expect("static regex")
});

static INSERT_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*INSERT\s+(?:OR\s+[A-Za-z]+\s+)?INTO\s+"?([A-Za-z_][A-Za-z0-9_]*)"#)
        .expect("static regex")
});

static AUTOINCREMENT_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bINTEGER\s+PRIMARY\s+KEY\s+AUTOINCREMENT\b").expect("static regex")
});

static AUTOINCREMENT_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAUTOINCREMENT\b").expect("static regex"));

static PRAGMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*PRAGMA\b").expect("static regex"));

static RETURNING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bRETURNING\b").expect("static regex"));

/// Replaces every `?` placeholder with `$1..$n`, preserving left-to-right
/// order.
///
/// This is a textual fold, not a data-aware substitution: a `?` inside a
/// quoted literal is folded too. Call sites bind literals through
/// parameters, so the limitation is acceptable — and pinned by a test
/// rather than half-fixed here.
pub fn fold_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0usize;
    for ch in sql.chars() {
        if ch == '?' {
            n += 1;
            out.push('$');
            out.push_str(&n.to_string());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Translates one canonical statement for direct execution on PostgreSQL.
///
/// `PRAGMA` has no client-server counterpart; outside of schema scripts
/// (where directives are dropped wholesale) it cannot be rewritten and is
/// rejected.
///
/// # Errors
///
/// Returns [`DbError::Untranslatable`] for `PRAGMA`, for any
/// `INSERT OR <verb>` other than `IGNORE`, and for `AUTOINCREMENT` outside
/// the `INTEGER PRIMARY KEY AUTOINCREMENT` form.
pub fn translate_statement(sql: &str) -> Result<String, DbError> {
    if PRAGMA.is_match(sql) {
        return Err(untranslatable("PRAGMA", sql));
    }
    rewrite(sql)
}

/// Translates one statement of a schema script. A statement that is solely
/// a `PRAGMA` directive is dropped (`Ok(None)`); everything else follows
/// [`translate_statement`] rules.
pub fn translate_script_statement(sql: &str) -> Result<Option<String>, DbError> {
    if PRAGMA.is_match(sql) {
        return Ok(None);
    }
    rewrite(sql).map(Some)
}

fn rewrite(sql: &str) -> Result<String, DbError> {
    let mut out = sql
        .trim()
        .trim_end_matches(';')
        .trim_end()
        .to_string();
    let mut append_conflict_clause = false;

    if let Some(caps) = INSERT_CONFLICT.captures(&out) {
        let verb = caps
            .get(1)
            .map(|m| m.as_str().to_ascii_uppercase())
            .unwrap_or_default();
        if verb != "IGNORE" {
            return Err(untranslatable(&format!("INSERT OR {verb}"), sql));
        }
        // `ON CONFLICT DO NOTHING` matches the IGNORE semantics provided the
        // target table declares the relevant unique constraint; the schema
        // owns that contract.
        out = INSERT_CONFLICT.replace(&out, "INSERT INTO ").into_owned();
        append_conflict_clause = true;
    }

    if AUTOINCREMENT_ANY.is_match(&out) {
        out = AUTOINCREMENT_COLUMN
            .replace_all(&out, "SERIAL PRIMARY KEY")
            .into_owned();
        if AUTOINCREMENT_ANY.is_match(&out) {
            return Err(untranslatable("AUTOINCREMENT", sql));
        }
    }

    out = fold_placeholders(&out);

    if append_conflict_clause {
        out.push_str(" ON CONFLICT DO NOTHING");
    }
    Ok(out)
}

/// Table name targeted by an INSERT statement, canonical or translated.
pub(crate) fn insert_target(sql: &str) -> Option<String> {
    INSERT_TARGET
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Whether the statement already carries a RETURNING clause.
pub(crate) fn has_returning(sql: &str) -> bool {
    RETURNING.is_match(sql)
}

fn untranslatable(construct: &str, statement: &str) -> DbError {
    DbError::Untranslatable {
        construct: construct.to_string(),
        statement: statement.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_fold_in_order() {
        assert_eq!(
            fold_placeholders("SELECT * FROM t WHERE a = ? AND b = ? AND c = ?"),
            "SELECT * FROM t WHERE a = $1 AND b = $2 AND c = $3"
        );
    }

    #[test]
    fn placeholder_count_is_preserved() {
        let sql = "INSERT INTO t (a, b, c, d) VALUES (?, ?, ?, ?)";
        let folded = fold_placeholders(sql);
        let markers = (1..=4).all(|n| folded.contains(&format!("${n}")));
        assert!(markers, "got: {folded}");
        assert!(!folded.contains('?'));
    }

    #[test]
    fn fold_is_textual_even_inside_literals() {
        // Documented limitation: the fold does not parse quotes. A literal
        // question mark must be bound as a parameter, not embedded.
        assert_eq!(
            fold_placeholders("SELECT 'why?' WHERE a = ?"),
            "SELECT 'why$1' WHERE a = $2"
        );
    }

    #[test]
    fn insert_or_ignore_becomes_on_conflict() {
        let out = translate_statement("INSERT OR IGNORE INTO profiles (username) VALUES (?)")
            .expect("should translate");
        assert_eq!(
            out,
            "INSERT INTO profiles (username) VALUES ($1) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn insert_or_replace_fails_loudly() {
        let err = translate_statement("INSERT OR REPLACE INTO t (id) VALUES (?)")
            .expect_err("should refuse");
        match err {
            DbError::Untranslatable { construct, .. } => {
                assert_eq!(construct, "INSERT OR REPLACE")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn autoincrement_becomes_serial() {
        let out = translate_statement(
            "CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)",
        )
        .expect("should translate");
        assert!(out.contains("SERIAL PRIMARY KEY"), "got: {out}");
        assert!(!out.to_ascii_uppercase().contains("AUTOINCREMENT"));
    }

    #[test]
    fn stray_autoincrement_fails_loudly() {
        let err = translate_statement("CREATE TABLE t (id BIGINT AUTOINCREMENT)")
            .expect_err("should refuse");
        match err {
            DbError::Untranslatable { construct, .. } => assert_eq!(construct, "AUTOINCREMENT"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pragma_statement_is_rejected_outside_scripts() {
        let err = translate_statement("PRAGMA busy_timeout = 5000").expect_err("should refuse");
        assert!(matches!(err, DbError::Untranslatable { .. }));
    }

    #[test]
    fn pragma_is_dropped_from_scripts() {
        assert_eq!(
            translate_script_statement("PRAGMA foreign_keys = ON").expect("should translate"),
            None
        );
        assert!(translate_script_statement("CREATE TABLE t (id INTEGER)")
            .expect("should translate")
            .is_some());
    }

    #[test]
    fn insert_target_is_extracted() {
        assert_eq!(
            insert_target("INSERT INTO profiles (a) VALUES (1)").as_deref(),
            Some("profiles")
        );
        assert_eq!(
            insert_target("  insert or ignore into Activity_Log (a) values (?)").as_deref(),
            Some("activity_log")
        );
        assert_eq!(insert_target("SELECT 1"), None);
    }

    #[test]
    fn returning_clause_is_detected() {
        assert!(has_returning("INSERT INTO t (a) VALUES (1) RETURNING id"));
        assert!(!has_returning("INSERT INTO t (a) VALUES (1)"));
    }

    #[test]
    fn trailing_semicolon_does_not_break_the_conflict_clause() {
        let out = translate_statement("INSERT OR IGNORE INTO t (id) VALUES (?);")
            .expect("should translate");
        assert!(out.ends_with("ON CONFLICT DO NOTHING"), "got: {out}");
    }
}
