//! Text helpers for stored snippets.

/// Collapse newlines into spaces and keep at most `max_chars` characters.
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .take(max_chars)
        .collect()
}
