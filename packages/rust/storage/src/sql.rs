//! Helpers for binding variable-length parameter lists.

use libsql::Value;
use libsql::params::Params;

/// Positional placeholders `?start, ?start+1, ...` for `count` values.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build `"{prefix} IN (?1, ..., ?n){suffix}"` with every value bound positionally.
///
/// Returns `None` for an empty list; `IN ()` is not valid SQLite.
pub(crate) fn in_list<V: Into<Value>>(
    prefix: &str,
    values: impl IntoIterator<Item = V>,
    suffix: &str,
) -> Option<(String, Params)> {
    let bound: Vec<Value> = values.into_iter().map(Into::into).collect();
    if bound.is_empty() {
        return None;
    }
    let sql = format!("{prefix} IN ({}){suffix}", placeholders(1, bound.len()));
    Some((sql, Params::Positional(bound)))
}
