//! Text helpers shared by the scrapers, the filter, and the digest.
//!
//! - Markup stripping for titles and summaries pulled out of HTML or feeds
//! - Whitespace collapsing
//! - Char-boundary-safe slicing and truncation for log previews

use scraper::Html;

/// Strip tags and decode entities, collapsing runs of whitespace.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(clean_html("<b>医療</b> &amp; AI"), "医療 & AI");
/// ```
pub fn clean_html(text: &str) -> String {
    if !text.contains('<') && !text.contains('&') {
        return collapse_whitespace(text);
    }
    let fragment = Html::parse_fragment(text);
    let plain = fragment.root_element().text().collect::<String>();
    collapse_whitespace(&plain)
}

/// Replace every run of whitespace with a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The slice of `text` starting at byte `start` and spanning at most `len`
/// bytes, shortened as needed to land on char boundaries.
pub fn window_after(text: &str, start: usize, len: usize) -> &str {
    if start >= text.len() {
        return "";
    }
    let mut start = start;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    let mut end = (start + len).min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[start..end]
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the characters left out.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}…(+{} chars)", head, total - max)
    }
}
