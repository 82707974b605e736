//! Identifier normalization shared by the graph loader and the taxonomy
//! resolver.

/// Fold a free-text identifier into the canonical lookup form: lowercase,
/// trimmed, with runs of whitespace and punctuation collapsed to a single
/// underscore. `"  React.js "` and `"react js"` normalize identically.
pub fn normalize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Clean an optional free-text field: trim and drop empty values.
#[inline]
pub fn clean_optional(s: Option<&str>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
