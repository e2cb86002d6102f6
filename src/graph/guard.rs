//! Read-only gate for query text
//!
//! Every adapter runs [`ensure_read_only`] before a query reaches the store,
//! so a misbehaving generation step cannot write to the graph.

use super::{GraphError, GraphResult};
use regex::Regex;
use std::sync::LazyLock;

/// Clauses that write to the graph or reach outside of it
pub const MUTATING_KEYWORDS: &[&str] = &[
    "CREATE", "DELETE", "DETACH", "SET", "MERGE", "REMOVE", "DROP", "FOREACH", "LOAD", "CALL",
];

static MUTATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = MUTATING_KEYWORDS.join("|");
    Regex::new(&format!(r"(?i)\b({})\b", alternatives)).expect("static keyword pattern")
});

/// Reject query text that contains a mutating keyword, in any case.
///
/// String literals and comments are removed first, so `'Asset Merge Tool'`
/// in a filter does not trip the gate and a quote inside a comment cannot
/// hide the statement that follows it.
pub fn ensure_read_only(query: &str) -> GraphResult<()> {
    if query.trim().is_empty() {
        return Err(GraphError::Query("empty query".to_string()));
    }

    let stripped = strip_literals(query)?;
    if let Some(found) = MUTATION_PATTERN.find(&stripped) {
        return Err(GraphError::MutationRejected(found.as_str().to_uppercase()));
    }
    Ok(())
}

/// Replace the contents of every quoted literal with nothing, keeping the
/// quotes, and drop comments. An unterminated literal or block comment is an
/// error so that nothing after the opening token escapes inspection.
///
/// Backtick identifiers are kept as written, but quotes and comment markers
/// inside them are not interpreted.
pub fn strip_literals(query: &str) -> GraphResult<String> {
    let mut out = String::with_capacity(query.len());
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                // line comment runs to the newline, which is kept
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                let mut closed = false;
                for inner in chars.by_ref() {
                    if previous == '*' && inner == '/' {
                        closed = true;
                        break;
                    }
                    previous = inner;
                }
                if !closed {
                    return Err(GraphError::Query("unterminated block comment".to_string()));
                }
                out.push(' ');
            }
            '`' => {
                out.push(c);
                let mut closed = false;
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == '`' {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(GraphError::Query("unterminated identifier".to_string()));
                }
            }
            '\'' | '"' => {
                out.push(c);
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    if inner == '\\' {
                        chars.next();
                    } else if inner == c {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(GraphError::Query("unterminated string literal".to_string()));
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}
