//! Variable reference path scanner
//!
//! Parses `$post.meta[0].value` style references into an ordered list of
//! string segments. The grammar is deliberately small: dots separate
//! fields/keys, brackets hold an index or a quoted key. Bracketed segments
//! are kept as strings even when numeric-looking; whether they act as an
//! array index or a map key is decided against the value being traversed,
//! not here.

/// Sigil that marks a string as a variable reference rather than a literal
pub const REFERENCE_SIGIL: char = '$';

/// Check whether a string is a variable reference
pub fn is_reference(s: &str) -> bool {
    s.len() > 1 && s.starts_with(REFERENCE_SIGIL)
}

/// Split a reference into its base variable name and path segments.
///
/// A leading sigil is stripped if present. The first returned segment is
/// always the base variable name; an empty input yields a single empty
/// segment, which callers reject as an undefined variable.
pub fn parse_path(reference: &str) -> Vec<String> {
    let path = reference.strip_prefix(REFERENCE_SIGIL).unwrap_or(reference);

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                segments.push(std::mem::take(&mut current));
            }
            '[' => {
                if !current.is_empty() || segments.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let mut inner = String::new();
                for inner_ch in chars.by_ref() {
                    if inner_ch == ']' {
                        break;
                    }
                    inner.push(inner_ch);
                }
                segments.push(strip_quotes(&inner).to_string());
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() || segments.is_empty() {
        segments.push(current);
    }

    segments
}

/// Remove one layer of matching single or double quotes
fn strip_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}
