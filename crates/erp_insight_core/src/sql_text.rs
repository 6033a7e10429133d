//! crates/erp_insight_core/src/sql_text.rs
//!
//! Text helpers around SQL: extracting a statement from free-form model
//! output and building substring patterns for `LIKE` searches.

use crate::ports::SQL_ERROR_SENTINEL;

/// Keywords that keep a captured statement going. Matched case-sensitively.
const CONTINUATION_KEYWORDS: [&str; 6] = ["SELECT", "FROM", "WHERE", "GROUP", "ORDER", "HAVING"];

/// Extracts the SQL statement from a model response.
///
/// Capture starts at the first line opening with `SELECT` or `WITH` and ends
/// after a line terminated by `;` or after a non-empty line carrying none of
/// the continuation keywords. Returns `response` unchanged when nothing is
/// captured.
pub fn clean_sql_response(response: &str) -> String {
    let mut captured: Vec<&str> = Vec::new();
    let mut in_statement = false;

    for line in response.split('\n') {
        let trimmed = line.trim();

        if starts_with_ignore_case(trimmed, "SELECT") || starts_with_ignore_case(trimmed, "WITH") {
            in_statement = true;
        }

        if !in_statement {
            continue;
        }

        captured.push(line);

        let keeps_going = CONTINUATION_KEYWORDS.iter().any(|kw| trimmed.contains(kw));
        if trimmed.ends_with(';') || (!keeps_going && !trimmed.is_empty()) {
            break;
        }
    }

    if captured.is_empty() {
        response.to_string()
    } else {
        captured.join("\n")
    }
}

/// True when `sql` cannot be executed: blank, or the generation sentinel.
pub fn is_generation_failure(sql: &str) -> bool {
    sql.trim().is_empty() || sql.starts_with(SQL_ERROR_SENTINEL)
}

/// Wraps `term` as a `%term%` pattern with `LIKE` wildcards escaped.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}
