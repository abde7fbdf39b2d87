//! Small string helpers shared by the pipeline stages.
//!
//! - Bounded excerpts of untrusted text for logging
//! - Character-safe truncation for feed summaries
//! - JSON error classification for model responses

/// Truncate a string for logging purposes.
///
/// Long strings are cut after `max` characters and suffixed with an ellipsis
/// and the number of bytes that were dropped.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Keep at most `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        None => s,
        Some((cut, _)) => &s[..cut],
    }
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// A model response cut off by its token limit fails with an EOF error
/// rather than a syntax error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte_boundary() {
        let s = "é".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert_eq!(result, "ééé…(+14 bytes)");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("Genève talks", 4), "Genè");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"[{"question": "value"#;
        let err = serde_json::from_str::<serde_json::Value>(json_eof).unwrap_err();
        assert!(looks_truncated(&err));

        let json_syntax = r#"[{"question": nope}]"#;
        let err = serde_json::from_str::<serde_json::Value>(json_syntax).unwrap_err();
        assert!(!looks_truncated(&err));
    }
}
