//! Effective query composition for the file store.
//!
//! The translated predicate is never trusted to carry the standing filters;
//! they are added here.

/// Standing filter: archived/trashed items are never returned.
pub const NOT_TRASHED: &str = "trashed = false";

/// Combine scope restriction, translated predicate and the not-trashed filter.
///
/// - scope + predicate: `'<scope>' in parents and (<predicate>) and trashed = false`
/// - predicate only:    `<predicate> and trashed = false`
/// - empty predicate:   the scope / not-trashed clauses alone
pub fn compose_query(predicate: &str, scope: Option<&str>) -> String {
    let predicate = predicate.trim();
    let scope = scope.map(str::trim).filter(|s| !s.is_empty());

    match (scope, predicate.is_empty()) {
        (Some(scope), false) => format!(
            "'{}' in parents and ({predicate}) and {NOT_TRASHED}",
            escape_literal(scope)
        ),
        (Some(scope), true) => format!("'{}' in parents and {NOT_TRASHED}", escape_literal(scope)),
        (None, false) => format!("{predicate} and {NOT_TRASHED}"),
        (None, true) => NOT_TRASHED.to_string(),
    }
}

fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}
