//! Data models shared by every stage of the digest pipeline.
//!
//! - [`Article`]: one discovered news item, normalized across sources
//! - [`SourceKind`]: the known origins of articles, with their dedup priority
//!   and display name
//!
//! Articles are plain values. Stages that add information (the keyword
//! filter) build a new record instead of mutating the one they were given.

use chrono::{DateTime, FixedOffset};

/// Title used when a source record has none.
pub const UNTITLED: &str = "(no title)";

/// A news item as produced by a source adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    /// Headline, never empty (falls back to [`UNTITLED`]).
    pub title: String,
    /// Absolute article URL. Records without one never reach the filter.
    pub link: String,
    /// Date string exactly as the source published it.
    pub published: Option<String>,
    /// Parsed publication time; `None` when absent or unparsable.
    pub published_at: Option<DateTime<FixedOffset>>,
    /// Plain-text description with markup removed.
    pub summary: Option<String>,
    /// Configured keywords found in the title and summary, medical first.
    /// Empty until the article has passed the topical filter.
    pub matched_keywords: Vec<String>,
}

impl Article {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            UNTITLED.to_string()
        } else {
            title.trim().to_string()
        };
        Self {
            title,
            link: link.into().trim().to_string(),
            published: None,
            published_at: None,
            summary: None,
            matched_keywords: Vec::new(),
        }
    }

    /// Attach the raw date string and whatever could be parsed from it.
    pub fn with_published(mut self, raw: Option<String>) -> Self {
        self.published_at = raw.as_deref().and_then(crate::scrapers::parse_datetime);
        self.published = raw;
        self
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary.filter(|s| !s.trim().is_empty());
        self
    }

    /// Copy of this article carrying the keywords that matched it.
    pub fn with_matched_keywords(&self, keywords: Vec<String>) -> Self {
        Self {
            matched_keywords: keywords,
            ..self.clone()
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        SourceKind::from_link(&self.link)
    }
}

/// Where an article came from, inferred from its link.
///
/// The declaration order is the priority order: when two sources carry the
/// same story, the one listed first is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    PrTimes,
    MedicalTech,
    HealthTechWatch,
    GoogleNews,
    Other,
}

impl SourceKind {
    /// All kinds in digest order.
    pub const ALL: [SourceKind; 5] = [
        SourceKind::PrTimes,
        SourceKind::MedicalTech,
        SourceKind::HealthTechWatch,
        SourceKind::GoogleNews,
        SourceKind::Other,
    ];

    pub fn from_link(link: &str) -> Self {
        let host = match url::Url::parse(link) {
            Ok(parsed) => parsed.host_str().map(|h| h.to_lowercase()),
            Err(_) => None,
        };
        let Some(host) = host else {
            return SourceKind::Other;
        };
        Self::ALL
            .into_iter()
            .find(|kind| {
                kind.domain()
                    .is_some_and(|d| host == d || host.ends_with(&format!(".{d}")))
            })
            .unwrap_or(SourceKind::Other)
    }

    pub fn domain(self) -> Option<&'static str> {
        match self {
            SourceKind::PrTimes => Some("prtimes.jp"),
            SourceKind::MedicalTech => Some("medicaltech-news.com"),
            SourceKind::HealthTechWatch => Some("ht-watch.com"),
            SourceKind::GoogleNews => Some("news.google.com"),
            SourceKind::Other => None,
        }
    }

    /// Lower is preferred.
    pub fn priority(self) -> u8 {
        match self {
            SourceKind::PrTimes => 1,
            SourceKind::MedicalTech => 2,
            SourceKind::HealthTechWatch => 3,
            SourceKind::GoogleNews => 4,
            SourceKind::Other => 5,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SourceKind::PrTimes => "PR TIMES",
            SourceKind::MedicalTech => "医療テックニュース",
            SourceKind::HealthTechWatch => "ヘルステックウォッチ",
            SourceKind::GoogleNews => "Googleニュース",
            SourceKind::Other => "その他",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_defaults_blank_title() {
        let article = Article::new("   ", "https://prtimes.jp/a");
        assert_eq!(article.title, UNTITLED);
        assert!(article.matched_keywords.is_empty());
    }

    #[test]
    fn test_with_published_parses_rfc2822() {
        let article = Article::new("t", "https://prtimes.jp/a")
            .with_published(Some("Mon, 15 Jan 2024 10:00:00 +0900".to_string()));
        assert_eq!(
            article.published.as_deref(),
            Some("Mon, 15 Jan 2024 10:00:00 +0900")
        );
        assert!(article.published_at.is_some());
    }

    #[test]
    fn test_with_published_keeps_raw_when_unparsable() {
        let article = Article::new("t", "https://prtimes.jp/a")
            .with_published(Some("sometime last week".to_string()));
        assert_eq!(article.published.as_deref(), Some("sometime last week"));
        assert_eq!(article.published_at, None);
    }

    #[test]
    fn test_with_matched_keywords_leaves_original_untouched() {
        let original = Article::new("医療AI", "https://prtimes.jp/a");
        let tagged = original.with_matched_keywords(vec!["医療".into(), "AI".into()]);
        assert!(original.matched_keywords.is_empty());
        assert_eq!(tagged.matched_keywords, vec!["医療", "AI"]);
        assert_eq!(tagged.title, original.title);
    }

    #[test]
    fn test_source_kind_from_link() {
        assert_eq!(
            SourceKind::from_link("https://prtimes.jp/main/html/rd/p/1.html"),
            SourceKind::PrTimes
        );
        assert_eq!(
            SourceKind::from_link("https://www.medicaltech-news.com/post/2"),
            SourceKind::MedicalTech
        );
        assert_eq!(
            SourceKind::from_link("https://ht-watch.com/article/3"),
            SourceKind::HealthTechWatch
        );
        assert_eq!(
            SourceKind::from_link("https://news.google.com/rss/articles/abc"),
            SourceKind::GoogleNews
        );
        assert_eq!(
            SourceKind::from_link("https://example.com/x"),
            SourceKind::Other
        );
        assert_eq!(SourceKind::from_link("not a url"), SourceKind::Other);
    }

    #[test]
    fn test_lookalike_domain_is_not_matched() {
        assert_eq!(
            SourceKind::from_link("https://notprtimes.jp/a"),
            SourceKind::Other
        );
    }

    #[test]
    fn test_priority_follows_declaration_order() {
        let priorities: Vec<u8> = SourceKind::ALL.iter().map(|k| k.priority()).collect();
        assert_eq!(priorities, vec![1, 2, 3, 4, 5]);
    }
}
