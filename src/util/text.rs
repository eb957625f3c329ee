//! Text normalisation helpers for source-fetcher output: whitespace collapsed, control
//! characters stripped, per the fetch-record normalisation rule.

/// Collapses runs of whitespace (including newlines/tabs) into single spaces and trims
/// the result.
#[must_use]
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drops ASCII control characters (everything below 0x20 except nothing — tab/newline
/// are already folded into spaces by `collapse_whitespace` if called first) and DEL.
#[must_use]
pub(crate) fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .collect()
}

/// Truncates to `max_chars` Unicode scalar values, never splitting inside a codepoint.
#[must_use]
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_whitespace_folds_newlines_and_tabs() {
        assert_eq!(collapse_whitespace("a\n\tb   c"), "a b c");
    }

    #[test]
    fn strip_control_chars_removes_non_printable() {
        let input = "hello\u{0007}world";
        assert_eq!(strip_control_chars(input), "helloworld");
    }

    #[test]
    fn truncate_chars_respects_unicode_boundaries() {
        let input = "héllo";
        assert_eq!(truncate_chars(input, 3), "hél");
    }
}
