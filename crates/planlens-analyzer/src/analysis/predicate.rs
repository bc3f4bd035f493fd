//! Column extraction from predicate text
//!
//! Best effort: predicates are split on boolean connectives and comparison
//! operators, and each operand that looks like a plain (optionally dotted)
//! identifier contributes its last segment. Literals, parameters, keywords
//! and expressions are skipped.

use regex::Regex;
use std::sync::LazyLock;

static SPLIT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s+(?:AND|OR)\s+|\bNOT\s+|<>|!=|>=|<=|=|<|>|\s+(?:NOT\s+)?(?:LIKE|ILIKE|IN|IS|BETWEEN)\s+",
    )
    .expect("valid regex")
});

static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$#]*(?:\.[A-Za-z_][A-Za-z0-9_$#]*)*$").expect("valid regex")
});

const KEYWORDS: &[&str] = &[
    "ALL", "AND", "ANY", "BETWEEN", "CASE", "ELSE", "END", "EXISTS", "FALSE", "IN", "IS", "LIKE",
    "NOT", "NULL", "OR", "SELECT", "SOME", "THEN", "TRUE", "UNKNOWN", "WHEN",
];

/// Extracts the columns referenced by a predicate, in order of first
/// appearance and without case-insensitive duplicates
pub fn extract_predicate_columns(predicate: &str) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();

    for operand in SPLIT_REGEX.split(predicate) {
        let Some(column) = operand_column(operand) else {
            continue;
        };
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(&column)) {
            columns.push(column);
        }
    }

    columns
}

fn operand_column(operand: &str) -> Option<String> {
    let trimmed = operand.trim().trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace());

    // PostgreSQL casts: `(status)::text`
    let uncast = trimmed
        .split("::")
        .next()
        .unwrap_or_default()
        .trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace());

    if uncast.is_empty() || is_literal(uncast) {
        return None;
    }

    let unquoted: String = uncast
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '"' | '`'))
        .collect();

    if !IDENTIFIER_REGEX.is_match(&unquoted) {
        return None;
    }

    let column = unquoted.rsplit('.').next().unwrap_or_default();
    if KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(column)) {
        return None;
    }

    Some(column.to_string())
}

fn is_literal(operand: &str) -> bool {
    let first = operand.chars().next().unwrap_or_default();
    first.is_ascii_digit()
        || matches!(first, '\'' | '$' | '@' | '?' | ':')
        || (first == '-' && operand[1..].starts_with(|c: char| c.is_ascii_digit()))
        || ((first == 'N' || first == 'n') && operand[1..].starts_with('\''))
}
