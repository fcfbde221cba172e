//! Excerpt extraction and case-insensitive term matching.
//!
//! Searchers filter with [`contains_term`] and build previews with
//! [`extract`], so an item is only ever included when the same matcher that
//! positions its excerpt found the term.
//!
//! All positions and lengths are counted in `char`s, never bytes, so
//! multi-byte text is never split inside a code point.

use regex::Regex;
use std::sync::LazyLock;

/// Default number of context characters kept on each side of a match.
pub const DEFAULT_WINDOW: usize = 150;

const ELLIPSIS: &str = "...";

/// HTML elements GitLab renders or users paste into descriptions, plus
/// comments. Anything else in angle brackets (`Vec<String>`, `<u8>`) is
/// left alone.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<!--.*?-->|</?(?:a|abbr|b|blockquote|body|br|center|code|del|details|div|em|h[1-6]|head|hr|html|i|img|ins|kbd|li|mark|ol|p|pre|s|small|span|strong|sub|summary|sup|table|tbody|td|th|thead|title|tr|u|ul)\b[^<>]*>",
    )
    .expect("static regex compiles")
});

/// Remove HTML tags and surrounding whitespace.
pub fn strip_markup(text: &str) -> String {
    TAG_RE.replace_all(text, "").trim().to_string()
}

fn chars_eq(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn find_in(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| {
        haystack[i..i + needle.len()]
            .iter()
            .zip(needle)
            .all(|(a, b)| chars_eq(*a, *b))
    })
}

/// Char index of the first case-insensitive occurrence of `needle`.
///
/// An empty needle never matches.
pub fn find_term(haystack: &str, needle: &str) -> Option<usize> {
    let haystack: Vec<char> = haystack.chars().collect();
    let needle: Vec<char> = needle.chars().collect();
    find_in(&haystack, &needle)
}

/// Case-insensitive substring test.
pub fn contains_term(haystack: &str, needle: &str) -> bool {
    find_term(haystack, needle).is_some()
}

/// Build a preview of `text` around the first occurrence of `search_term`.
///
/// The excerpt body never exceeds `2 * window` characters. Context that is
/// left over after the match is split evenly between both sides, and each
/// clipped side is marked with `...`. When the term does not occur in the
/// text (the item matched on another field), the first `2 * window`
/// characters are returned instead.
pub fn extract(text: &str, search_term: &str, window: usize) -> String {
    let plain = strip_markup(text);
    let chars: Vec<char> = plain.chars().collect();
    if chars.is_empty() {
        return String::new();
    }

    let budget = window.saturating_mul(2);
    let needle: Vec<char> = search_term.chars().collect();

    let Some(pos) = find_in(&chars, &needle) else {
        return leading(&chars, budget);
    };

    let match_len = needle.len().min(budget);
    let side = (budget - match_len) / 2;
    let start = pos.saturating_sub(side);
    let end = (pos + match_len + side).min(chars.len());

    let mut excerpt = String::with_capacity(end - start + 2 * ELLIPSIS.len());
    if start > 0 {
        excerpt.push_str(ELLIPSIS);
    }
    excerpt.extend(&chars[start..end]);
    if end < chars.len() {
        excerpt.push_str(ELLIPSIS);
    }
    excerpt
}

fn leading(chars: &[char], budget: usize) -> String {
    let mut excerpt: String = chars.iter().take(budget).collect();
    if chars.len() > budget {
        excerpt.push_str(ELLIPSIS);
    }
    excerpt
}
