//! Small shared helpers.

/// Maximum length of a sanitized file stem.
const MAX_STEM_LEN: usize = 100;

/// Turns arbitrary text (plan titles, search queries) into a safe file stem.
///
/// Whitespace becomes underscores, anything outside `[A-Za-z0-9._-]` is
/// dropped, and the result is capped at 100 characters. Returns `"file"`
/// when nothing survives.
pub fn sanitize_filename(text: &str) -> String {
    let cleaned: String = text
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .take(MAX_STEM_LEN)
        .collect();

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces_become_underscores() {
        assert_eq!(sanitize_filename("My Great Video"), "My_Great_Video");
    }

    #[test]
    fn test_strips_unsafe_characters() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j"), "abcdefghij");
        assert_eq!(sanitize_filename("hooks & ladders!"), "hooks__ladders");
    }

    #[test]
    fn test_keeps_dots_dashes_underscores() {
        assert_eq!(sanitize_filename("clip-01_final.v2"), "clip-01_final.v2");
    }

    #[test]
    fn test_truncates_long_input() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_filename(&long).len(), 100);
    }

    #[test]
    fn test_empty_falls_back() {
        assert_eq!(sanitize_filename(""), "file");
        assert_eq!(sanitize_filename("   "), "file");
        assert_eq!(sanitize_filename("///"), "file");
    }
}
