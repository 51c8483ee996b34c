//! Rewrites neutral `?` markers into PostgreSQL's numbered `$n` parameters.

/// The backend-neutral positional marker emitted by the query builder.
pub const MARKER: char = '?';

/// Replaces every `?` in `query` with `$1`, `$2`, … in left-to-right order.
///
/// The scan is purely lexical: callers must not embed literal `?` characters
/// (e.g. inside string literals) in the query text.
#[must_use]
pub fn to_numbered(query: &str) -> String {
    if !query.contains(MARKER) {
        return query.to_owned();
    }

    let mut numbered = String::with_capacity(query.len() + 8);
    let mut position = 0_usize;
    for c in query.chars() {
        if c == MARKER {
            position += 1;
            numbered.push('$');
            numbered.push_str(&position.to_string());
        } else {
            numbered.push(c);
        }
    }
    numbered
}
