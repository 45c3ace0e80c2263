//! Output file naming.

use chrono::NaiveDateTime;

/// Longest file name Linux accepts (NAME_MAX).
const NAME_MAX: usize = 255;

/// Name used when the caller gives none: the local start time, e.g. `2024-03-09_14-05-33.mp4`.
pub fn default_file_name(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%d_%H-%M-%S.mp4").to_string()
}

/// Makes a caller-supplied name safe to use as a single path component.
///
/// Path separators, NUL, whitespace and control characters become `_` (runs
/// collapse to one); leading and trailing dots, spaces and underscores are
/// removed; the result is cut to 255 bytes on a char boundary. May return an
/// empty string, which callers treat as "no name given".
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let unsafe_char = c == '/' || c == '\\' || c.is_control() || c.is_whitespace();
        let c = if unsafe_char { '_' } else { c };
        if c == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut take = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}

/// Sanitized `requested` name, or the timestamp default when it is absent or sanitizes to nothing.
pub fn resolve_file_name(requested: Option<&str>, now: NaiveDateTime) -> String {
    requested
        .map(sanitize_file_name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| default_file_name(now))
}
