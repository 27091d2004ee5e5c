//! Plain-text helpers for rendering post bodies.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap());

pub const EXCERPT_WORDS: usize = 55;
pub const EXCERPT_MORE: &str = "…";

/// Remove markup, including the contents of script and style blocks.
pub fn strip_tags(html: &str) -> String {
    let without_blocks = BLOCK_RE.replace_all(html, "");
    TAG_RE.replace_all(&without_blocks, " ").into_owned()
}

/// Keep the first `max_words` whitespace-separated words, appending `more` when
/// anything was cut.
pub fn trim_words(text: &str, max_words: usize, more: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return words.join(" ");
    }
    format!("{}{}", words[..max_words].join(" "), more)
}

/// Excerpt derived from an HTML body when no explicit excerpt exists.
pub fn auto_excerpt(html: &str) -> String {
    trim_words(&strip_tags(html), EXCERPT_WORDS, EXCERPT_MORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags_removes_markup_and_scripts() {
        let html = "<p>Hello <strong>world</strong></p><script>alert(1)</script>";
        assert_eq!(
            strip_tags(html).split_whitespace().collect::<Vec<_>>(),
            vec!["Hello", "world"]
        );
    }

    #[test]
    fn test_trim_words_short_text_untouched() {
        assert_eq!(trim_words("one  two three", 5, "…"), "one two three");
    }

    #[test]
    fn test_trim_words_appends_more() {
        assert_eq!(trim_words("a b c d", 2, "…"), "a b…");
    }

    #[test]
    fn test_auto_excerpt_caps_at_55_words() {
        let body = format!("<p>{}</p>", vec!["word"; 80].join(" "));
        let excerpt = auto_excerpt(&body);
        assert!(excerpt.ends_with(EXCERPT_MORE));
        assert_eq!(
            excerpt.trim_end_matches(EXCERPT_MORE).split_whitespace().count(),
            EXCERPT_WORDS
        );
    }
}
