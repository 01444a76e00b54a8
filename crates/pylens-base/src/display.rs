//! Debug-display helpers used when a lens fails to match, so error messages
//! show an escaped, truncated view of the offending input rather than a raw
//! dump that could span many lines.

const DEFAULT_TRUNCATE_LEN: usize = 40;

/// Renders control characters visibly: newlines as `[NL]`, tabs as `[TAB]`.
pub fn escape_for_display(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\n' => "[NL]".to_string(),
            '\t' => "[TAB]".to_string(),
            '\r' => "[CR]".to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// Truncates `s` to at most `max_len` characters, appending `...` if anything
/// was cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let head: String = s.chars().take(max_len).collect();
    format!("{head}...")
}

/// Truncates around a point of interest (e.g. a failure position), showing
/// a window of context on either side rather than always the start.
pub fn range_truncate(s: &str, center: usize, radius: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    let start = center.saturating_sub(radius);
    let end = (center + radius).min(chars.len());
    let window: String = chars[start..end].iter().collect();
    let prefix = if start > 0 { "..." } else { "" };
    let suffix = if end < chars.len() { "..." } else { "" };
    format!("{prefix}{window}{suffix}")
}

/// Convenience combining escaping and default-length truncation for the
/// common case of reporting "here's roughly what we were looking at".
pub fn describe(s: &str) -> String {
    truncate(&escape_for_display(s), DEFAULT_TRUNCATE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_renders_control_chars() {
        assert_eq!(escape_for_display("a\nb\tc"), "a[NL]b[TAB]c");
    }

    #[test]
    fn truncate_leaves_short_strings_alone() {
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[test]
    fn truncate_cuts_long_strings() {
        assert_eq!(truncate("abcdefgh", 4), "abcd...");
    }

    #[test]
    fn range_truncate_windows_around_center() {
        let s = "0123456789";
        assert_eq!(range_truncate(s, 5, 2), "...3456...");
    }

    #[test]
    fn range_truncate_no_ellipsis_at_edges() {
        let s = "abc";
        assert_eq!(range_truncate(s, 1, 5), "abc");
    }
}
