/*!
# Shared Types

Shared helpers used across the query modules: token positions and the
quoting/escaping rules for filter values. Values are stored decoded in the
token model and re-escaped whenever a token is serialized, so these two
directions must stay exact inverses.
*/
use serde::Serialize;

/// Byte range of a token inside the canonical query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    /// First byte of the token
    pub start: usize,
    /// One past the last byte of the token
    pub end: usize,
}

impl Position {
    /// Creates a new position from a half-open byte range.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length of the span in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` if the span covers no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns `true` if a filter value must be wrapped in double quotes to be
/// read back as the same single value, alone or as a list item. A bare
/// backslash would escape the separator after the value.
pub(crate) fn value_needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value.starts_with(['>', '<'])
        || value.contains(|c: char| {
            matches!(c, '"' | '(' | ')' | ',' | '[' | ']' | '\\')
                || c.is_whitespace()
        })
}

/// Escape a filter value for the query string, quoting it when needed:
/// `a"b` -> `"a\"b"`.
#[must_use]
pub fn escape_value(value: &str) -> String {
    if !value_needs_quotes(value) {
        return value.to_string();
    }

    let mut result = String::with_capacity(value.len() + 2);
    result.push('"');
    for c in value.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            _ => result.push(c),
        }
    }
    result.push('"');
    result
}

/// Decode the inside of a quoted value. This is the inverse of
/// [`escape_value`]: `\"` -> `"` and `\\` -> `\`. Any other backslash is
/// kept literally.
#[must_use]
pub fn unescape_quoted(inner: &str) -> String {
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(&next) = chars.peek()
            && matches!(next, '"' | '\\')
        {
            result.push(next);
            chars.next();
            continue;
        }
        result.push(c);
    }
    result
}

/// Decode a raw value as it appears in the query string, stripping the
/// surrounding quotes of a quoted value.
#[must_use]
pub fn decode_value(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        unescape_quoted(&raw[1..raw.len() - 1])
    } else {
        raw.to_string()
    }
}
