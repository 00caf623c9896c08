//! Reduction of source and decoded listings to [`NormalizedLine`]s.

use crate::NormalizedLine;

/// Segment registers, which look like labels when written `cs:` alone.
const SEGMENT_REGISTERS: [&str; 4] = ["cs", "ds", "es", "ss"];

/// Normalize one listing line.
///
/// Returns `None` for lines that carry no instruction or directive:
/// blank lines, comment-only lines and bare label definitions. A label
/// in front of an instruction is dropped.
pub fn line(raw: &str) -> Option<NormalizedLine> {
    let code = match raw.find(';') {
        Some(comment) => &raw[..comment],
        None => raw,
    };

    let mut rest = code.trim();
    if let Some((head, tail)) = rest.split_once(':') {
        if is_label(head) {
            rest = tail.trim();
        }
    }

    if rest.is_empty() {
        None
    } else {
        Some(NormalizedLine::new(rest))
    }
}

/// Normalize a whole listing, keeping only instruction and directive lines.
pub fn listing(text: &str) -> Vec<NormalizedLine> {
    text.lines().filter_map(line).collect()
}

/// Normalize lines that have already been split.
pub fn lines<S: AsRef<str>>(raw: &[S]) -> Vec<NormalizedLine> {
    raw.iter().filter_map(|item| line(item.as_ref())).collect()
}

fn is_label(token: &str) -> bool {
    let mut chars = token.chars();
    let starts_well = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_' || c == '@' || c == '.');

    starts_well
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '@' || c == '.' || c == '$')
        && !SEGMENT_REGISTERS.contains(&token.to_ascii_lowercase().as_str())
}
