//! Shared utility functions used across the codebase.

/// Find the largest valid UTF-8 char boundary at or before `pos`.
///
/// Polyfill for `str::floor_char_boundary` (nightly-only). Use when
/// truncating strings by byte position to avoid panicking on multi-byte
/// characters.
pub fn floor_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let mut i = pos;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Take at most `max_bytes` bytes of `s` without splitting a character.
pub fn prefix_bytes(s: &str, max_bytes: usize) -> &str {
    &s[..floor_char_boundary(s, max_bytes)]
}

/// Take at most `max_chars` characters of `s`.
pub fn prefix_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Extract the outermost `{ ... }` slice from an LLM reply.
///
/// Models often wrap JSON in prose or markdown fences; this takes the first
/// `{` through the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use crate::util::{extract_json_object, floor_char_boundary, prefix_bytes, prefix_chars};

    #[test]
    fn floor_char_boundary_at_valid_boundary() {
        assert_eq!(floor_char_boundary("hello", 3), 3);
    }

    #[test]
    fn floor_char_boundary_mid_multibyte_char() {
        // 'é' is 2 bytes (0xC3 0xA9), so position 2 is mid-char
        let s = "hé";
        assert_eq!(floor_char_boundary(s, 2), 1);
    }

    #[test]
    fn floor_char_boundary_past_end() {
        assert_eq!(floor_char_boundary("hi", 100), 2);
    }

    #[test]
    fn prefix_bytes_keeps_emoji_whole() {
        let s = "ok🚀go";
        assert_eq!(prefix_bytes(s, 4), "ok");
        assert_eq!(prefix_bytes(s, 6), "ok🚀");
    }

    #[test]
    fn extract_json_from_fenced_reply() {
        let reply = "Sure! ```json\n{\"a\": {\"b\": 1}}\n``` hope that helps";
        assert_eq!(extract_json_object(reply), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn extract_json_missing_braces() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn prefix_chars_counts_characters() {
        assert_eq!(prefix_chars("héllo", 2), "hé");
        assert_eq!(prefix_chars("hi", 10), "hi");
        assert_eq!(prefix_chars("abc", 0), "");
    }
}
