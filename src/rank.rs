//! Newest-first ordering.

use crate::models::Article;

/// Stable sort by publication time, newest first.
///
/// Articles without a parsed time go after every dated one and keep their
/// input order among themselves, as do articles published at the same
/// instant.
pub fn newest_first(mut articles: Vec<Article>) -> Vec<Article> {
    // `None < Some(_)`, so comparing in reverse also puts undated items last.
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    articles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(link: &str, published: Option<&str>) -> Article {
        Article::new("t", link).with_published(published.map(str::to_string))
    }

    fn links(articles: &[Article]) -> Vec<&str> {
        articles.iter().map(|a| a.link.as_str()).collect()
    }

    #[test]
    fn test_newest_first_with_undated_last() {
        let sorted = newest_first(vec![
            dated("u1", None),
            dated("old", Some("2024-01-01T09:00:00+09:00")),
            dated("u2", Some("not a date")),
            dated("new", Some("2024-01-03T09:00:00+09:00")),
            dated("mid", Some("2024-01-02T09:00:00+09:00")),
        ]);
        assert_eq!(links(&sorted), vec!["new", "mid", "old", "u1", "u2"]);
    }

    #[test]
    fn test_compares_instants_across_offsets() {
        // 10:00 JST is 01:00 UTC, so the UTC item at 02:00 is newer.
        let sorted = newest_first(vec![
            dated("jst", Some("2024-01-15T10:00:00+09:00")),
            dated("utc", Some("Mon, 15 Jan 2024 02:00:00 GMT")),
        ]);
        assert_eq!(links(&sorted), vec!["utc", "jst"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let sorted = newest_first(vec![
            dated("a", Some("2024-01-15 10:00")),
            dated("b", Some("2024-01-15T10:00:00+09:00")),
            dated("c", Some("2024-01-16")),
        ]);
        assert_eq!(links(&sorted), vec!["c", "a", "b"]);
    }
}
