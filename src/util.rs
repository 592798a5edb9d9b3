//! Shared utility functions used across the codebase.

/// Parse a boolean environment value.
///
/// Recognises `1`, `true`, `yes`, `on` and `0`, `false`, `no`, `off`
/// (case-insensitive). Anything else is `None` so callers can reject it.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Truncate `text` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Milliseconds in a duration, saturating at `u64::MAX`.
pub fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
