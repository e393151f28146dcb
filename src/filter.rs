//! Topical filter: keep only articles that talk about medicine and IT.
//!
//! Matching is a case-insensitive substring search over the title and the
//! summary joined by a space. An article survives when, in this order:
//!
//! 1. its link host is not an excluded domain (or a subdomain of one)
//! 2. no exclude keyword appears
//! 3. at least one medical keyword appears
//! 4. at least one IT keyword appears
//!
//! Survivors are returned as new records carrying the matched keywords in
//! their configured spelling, medical keywords first.

use crate::config::Settings;
use crate::models::Article;
use tracing::{debug, info};

/// Pre-filter diagnostic counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeywordHits {
    pub medical: usize,
    pub it: usize,
    pub both: usize,
}

/// A keyword as configured, plus its lowercased form for matching.
#[derive(Debug, Clone)]
struct Keyword {
    original: String,
    folded: String,
}

impl Keyword {
    fn new(raw: &str) -> Option<Self> {
        let original = raw.trim();
        if original.is_empty() {
            return None;
        }
        Some(Self {
            original: original.to_string(),
            folded: original.to_lowercase(),
        })
    }
}

fn keywords(raw: &[String]) -> Vec<Keyword> {
    raw.iter().filter_map(|k| Keyword::new(k)).collect()
}

#[derive(Debug, Clone)]
pub struct TopicFilter {
    medical: Vec<Keyword>,
    it: Vec<Keyword>,
    exclude: Vec<Keyword>,
    exclude_domains: Vec<String>,
}

impl TopicFilter {
    pub fn new(medical: &[String], it: &[String], exclude: &[String]) -> Self {
        Self {
            medical: keywords(medical),
            it: keywords(it),
            exclude: keywords(exclude),
            exclude_domains: Vec::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        settings.exclude_domains.iter().fold(
            Self::new(
                &settings.medical_keywords,
                &settings.it_keywords,
                &settings.exclude_keywords,
            ),
            |filter, domain| filter.with_excluded_domain(domain),
        )
    }

    pub fn with_excluded_domain(mut self, domain: &str) -> Self {
        let domain = domain.trim().trim_start_matches('.').to_lowercase();
        if !domain.is_empty() {
            self.exclude_domains.push(domain);
        }
        self
    }

    /// Filter `articles`, preserving their relative order.
    pub fn apply(&self, articles: &[Article]) -> Vec<Article> {
        let kept: Vec<Article> = articles.iter().filter_map(|a| self.matches(a)).collect();
        info!(before = articles.len(), after = kept.len(), "Filtered articles");
        kept
    }

    /// The tagged copy of `article` if it passes, `None` otherwise.
    pub fn matches(&self, article: &Article) -> Option<Article> {
        if self.is_excluded_domain(&article.link) {
            debug!(link = %article.link, "Dropped: excluded domain");
            return None;
        }

        let text = searchable_text(article);
        if let Some(hit) = self.exclude.iter().find(|k| text.contains(&k.folded)) {
            debug!(link = %article.link, keyword = %hit.original, "Dropped: excluded keyword");
            return None;
        }

        let medical = matched(&self.medical, &text);
        if medical.is_empty() {
            return None;
        }
        let it = matched(&self.it, &text);
        if it.is_empty() {
            return None;
        }

        Some(article.with_matched_keywords(medical.into_iter().chain(it).collect()))
    }

    /// Count articles mentioning each keyword family, ignoring exclusions.
    pub fn keyword_hits(&self, articles: &[Article]) -> KeywordHits {
        articles.iter().fold(KeywordHits::default(), |mut hits, article| {
            let text = searchable_text(article);
            let medical = self.medical.iter().any(|k| text.contains(&k.folded));
            let it = self.it.iter().any(|k| text.contains(&k.folded));
            hits.medical += usize::from(medical);
            hits.it += usize::from(it);
            hits.both += usize::from(medical && it);
            hits
        })
    }

    fn is_excluded_domain(&self, link: &str) -> bool {
        if self.exclude_domains.is_empty() {
            return false;
        }
        let Some(host) = url::Url::parse(link)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
        else {
            return false;
        };
        self.exclude_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }
}

fn searchable_text(article: &Article) -> String {
    format!(
        "{} {}",
        article.title,
        article.summary.as_deref().unwrap_or_default()
    )
    .to_lowercase()
}

fn matched(keywords: &[Keyword], text: &str) -> Vec<String> {
    keywords
        .iter()
        .filter(|k| text.contains(&k.folded))
        .map(|k| k.original.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> TopicFilter {
        TopicFilter::from_settings(&Settings::default())
    }

    fn article(title: &str, link: &str) -> Article {
        Article::new(title, link)
    }

    #[test]
    fn test_excluded_keyword_scenario() {
        let articles = vec![
            article("医療AIシステム導入", "https://prtimes.jp/x/1"),
            article("美容整形の新技術", "https://prtimes.jp/x/2"),
        ];
        let kept = filter().apply(&articles);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].link, "https://prtimes.jp/x/1");
        assert_eq!(kept[0].matched_keywords, vec!["医療", "AI", "システム"]);
    }

    #[test]
    fn test_exclusion_beats_matches() {
        let a = article("美容整形クリニックがAIアプリを導入", "https://prtimes.jp/x/3");
        assert!(filter().matches(&a).is_none());
    }

    #[test]
    fn test_requires_both_families() {
        assert!(filter().matches(&article("病院の新棟が完成", "https://a.example/1")).is_none());
        assert!(filter().matches(&article("クラウド会計の新機能", "https://a.example/2")).is_none());
    }

    #[test]
    fn test_summary_is_searched_case_insensitively() {
        let a = article("新サービスのお知らせ", "https://a.example/1")
            .with_summary(Some("看護の現場向けsaasを提供".to_string()));
        let kept = filter().matches(&a).unwrap();
        assert_eq!(kept.matched_keywords, vec!["看護", "SaaS"]);
    }

    #[test]
    fn test_keywords_follow_configured_order() {
        let f = TopicFilter::new(
            &["病院".into(), "医療".into()],
            &["DX".into(), "AI".into()],
            &[],
        );
        let kept = f
            .matches(&article("AIで医療DX、病院が挑む", "https://a.example/1"))
            .unwrap();
        assert_eq!(kept.matched_keywords, vec!["病院", "医療", "DX", "AI"]);
    }

    #[test]
    fn test_excluded_domain_and_subdomain() {
        let f = filter().with_excluded_domain("example.net");
        let title = "医療AIの最新動向";
        assert!(f.matches(&article(title, "https://example.net/a")).is_none());
        assert!(f.matches(&article(title, "https://news.example.net/a")).is_none());
        assert!(f.matches(&article(title, "https://notexample.net/a")).is_some());
        assert!(f.matches(&article(title, "https://prtimes.jp/a")).is_some());
    }

    #[test]
    fn test_apply_preserves_order_and_leaves_input_untouched() {
        let articles = vec![
            article("クリニックのDX事例", "https://a.example/1"),
            article("天気予報", "https://a.example/2"),
            article("製薬とデジタル", "https://a.example/3"),
        ];
        let kept = filter().apply(&articles);
        let links: Vec<&str> = kept.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(links, vec!["https://a.example/1", "https://a.example/3"]);
        assert!(articles.iter().all(|a| a.matched_keywords.is_empty()));
    }

    #[test]
    fn test_survivors_always_have_both_families() {
        let settings = Settings::default();
        let f = TopicFilter::from_settings(&settings);
        let titles = [
            "医療AIシステム導入",
            "病院DX",
            "歯科向けアプリ",
            "ITニュース",
            "エステ向けクラウド",
            "看護記録のデジタル化",
        ];
        let articles: Vec<Article> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| article(t, &format!("https://a.example/{i}")))
            .collect();
        for kept in f.apply(&articles) {
            assert!(
                kept.matched_keywords
                    .iter()
                    .any(|k| settings.medical_keywords.contains(k))
            );
            assert!(
                kept.matched_keywords
                    .iter()
                    .any(|k| settings.it_keywords.contains(k))
            );
        }
    }

    #[test]
    fn test_keyword_hits() {
        let articles = vec![
            article("医療AI", "https://a.example/1"),
            article("病院の話", "https://a.example/2"),
            article("クラウドの話", "https://a.example/3"),
            article("美容整形とAIと医療", "https://a.example/4"),
        ];
        assert_eq!(
            filter().keyword_hits(&articles),
            KeywordHits {
                medical: 3,
                it: 3,
                both: 2
            }
        );
    }
}
