//! Multi-statement script splitting.
//!
//! Both backends execute scripts one statement at a time so that schema
//! replay can classify each failure individually. The splitter understands
//! quoted literals, quoted identifiers, and SQL comments — a `;` inside any
//! of those is not a boundary.

/// Splits a script on `;` statement boundaries.
///
/// Returned statements are trimmed and keep no trailing semicolon.
/// Fragments that contain only whitespace and comments are dropped.
pub(crate) fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_content = false;

    let mut chars = script.chars().peekable();
    let mut state = State::Plain;

    while let Some(ch) = chars.next() {
        match state {
            State::Plain => match ch {
                ';' => {
                    push_statement(&mut statements, &mut current, &mut has_content);
                    continue;
                }
                '\'' => {
                    state = State::SingleQuote;
                    has_content = true;
                }
                '"' => {
                    state = State::DoubleQuote;
                    has_content = true;
                }
                '-' if chars.peek() == Some(&'-') => {
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    state = State::BlockComment;
                }
                c if !c.is_whitespace() => has_content = true,
                _ => {}
            },
            State::SingleQuote => {
                if ch == '\'' {
                    // A doubled quote is an escaped quote, not a terminator.
                    if chars.peek() == Some(&'\'') {
                        current.push(ch);
                        current.push(chars.next().unwrap_or('\''));
                        continue;
                    }
                    state = State::Plain;
                }
            }
            State::DoubleQuote => {
                if ch == '"' {
                    state = State::Plain;
                }
            }
            State::LineComment => {
                if ch == '\n' {
                    state = State::Plain;
                }
            }
            State::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    current.push(ch);
                    current.push(chars.next().unwrap_or('/'));
                    state = State::Plain;
                    continue;
                }
            }
        }
        current.push(ch);
    }
    push_statement(&mut statements, &mut current, &mut has_content);

    statements
}

#[derive(Clone, Copy, PartialEq)]
enum State {
    Plain,
    SingleQuote,
    DoubleQuote,
    LineComment,
    BlockComment,
}

fn push_statement(statements: &mut Vec<String>, current: &mut String, has_content: &mut bool) {
    // Leading comments are stripped so downstream translation can anchor on
    // the first keyword of the statement.
    let text = strip_leading_comments(current).trim();
    if *has_content && !text.is_empty() {
        statements.push(text.to_string());
    }
    current.clear();
    *has_content = false;
}

fn strip_leading_comments(mut text: &str) -> &str {
    loop {
        text = text.trim_start();
        if let Some(rest) = text.strip_prefix("--") {
            match rest.find('\n') {
                Some(idx) => text = &rest[idx + 1..],
                None => return "",
            }
        } else if let Some(rest) = text.strip_prefix("/*") {
            match rest.find("*/") {
                Some(idx) => text = &rest[idx + 2..],
                None => return "",
            }
        } else {
            return text;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_semicolons() {
        let stmts = split_statements("CREATE TABLE a (id INTEGER); CREATE TABLE b (id INTEGER);");
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("CREATE TABLE a"));
        assert!(stmts[1].starts_with("CREATE TABLE b"));
    }

    #[test]
    fn semicolon_inside_literal_is_not_a_boundary() {
        let stmts = split_statements("INSERT INTO t (s) VALUES ('a;b'); SELECT 1");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "INSERT INTO t (s) VALUES ('a;b')");
    }

    #[test]
    fn escaped_quote_stays_inside_literal() {
        let stmts = split_statements("INSERT INTO t (s) VALUES ('it''s;fine')");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0], "INSERT INTO t (s) VALUES ('it''s;fine')");
    }

    #[test]
    fn comments_do_not_hide_or_create_boundaries() {
        let script = "
            -- leading comment; with a semicolon
            CREATE TABLE t (id INTEGER); -- trailing; comment
            /* block; comment */ SELECT 1;
        ";
        let stmts = split_statements(script);
        assert_eq!(stmts.len(), 2, "got: {stmts:?}");
        assert!(stmts[1].contains("SELECT 1"));
    }

    #[test]
    fn comment_only_fragments_are_dropped() {
        assert!(split_statements("-- nothing here\n;\n  ;").is_empty());
    }

    #[test]
    fn final_statement_without_semicolon_is_kept() {
        let stmts = split_statements("SELECT 1");
        assert_eq!(stmts, vec!["SELECT 1".to_string()]);
    }
}
