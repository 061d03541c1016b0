// ABOUTME: Utility functions for slugs and string truncation
// ABOUTME: Provides consistent filename generation for published notes

pub fn slugify(text: &str) -> String {
    slug::slugify(text)
}

/// True when `slug` can be used verbatim as a single file-name component.
pub fn is_path_safe(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('.')
        && !slug
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control())
}

pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.len() <= max_chars {
        return s.to_string();
    }

    // Find a valid UTF-8 boundary at or before max_chars
    let mut boundary = max_chars;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }

    if boundary == 0 {
        return String::new();
    }

    format!("{}...", &s[..boundary])
}


#[cfg(test)]
mod truncate_tests {
    use super::*;

    #[test]
    fn test_truncate_str_short() {
        assert_eq!(truncate_str("hello", 100), "hello");
    }

    #[test]
    fn test_truncate_str_long() {
        let result = truncate_str("hello world", 7);
        assert!(result.starts_with("hello"));
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_truncate_str_utf8() {
        let text = "Hello 世界 World";
        let result = truncate_str(text, 8);
        assert_eq!(result, "Hello ...");
    }
}
