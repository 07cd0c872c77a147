//! Placeholder parser for `<<key>>` syntax
//!
//! Locates placeholder references together with their byte spans.

use std::ops::Range;

const OPEN: &str = "<<";
const CLOSE: &str = ">>";

/// A placeholder reference found in a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// The key between the delimiters, trimmed.
    pub key: String,

    /// Byte range of the whole `<<key>>` in the original string.
    pub span: Range<usize>,
}

/// Parses a string and extracts all placeholder references in order.
///
/// An unterminated `<<` ends the scan. When a second `<<` appears before
/// the closing `>>`, the innermost opener wins, so `<<a <<b>>` yields `b`.
///
/// # Examples
///
/// ```
/// use courier_application::variable_resolver::parse_placeholders;
///
/// let refs = parse_placeholders("https://<<host>>/users/<< id >>");
/// assert_eq!(refs.len(), 2);
/// assert_eq!(refs[0].key, "host");
/// assert_eq!(refs[1].key, "id");
/// ```
#[must_use]
pub fn parse_placeholders(input: &str) -> Vec<Placeholder> {
    let mut references = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = input[cursor..].find(OPEN) {
        let mut start = cursor + offset;
        let Some(close) = input[start + OPEN.len()..].find(CLOSE) else {
            break;
        };
        let end = start + OPEN.len() + close;

        // Skip to the last opener before the closing delimiter.
        if let Some(inner) = input[start + OPEN.len()..end].rfind(OPEN) {
            start = start + OPEN.len() + inner;
        }

        let key = input[start + OPEN.len()..end].trim();
        if !key.is_empty() {
            references.push(Placeholder {
                key: key.to_string(),
                span: start..end + CLOSE.len(),
            });
        }
        cursor = end + CLOSE.len();
    }

    references
}
