//! ヘルステックウォッチ (ht-watch.com) top-page scraper.
//!
//! Posts are `<article>` cards whose first child is a link wrapping an
//! `<h2>` title, optionally followed by a `p.date`. The fallback accepts any
//! link inside an `<article>` that is followed by an `<h2>`.

use crate::models::Article;
use crate::scrapers::{FetchError, Http, SourceAdapter, resolve_link, summary};
use crate::utils::clean_html;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument, warn};
use url::Url;

pub const SOURCE_ID: &str = "htwatch";

const PAGE_URL: &str = "https://ht-watch.com/";

const MIN_FALLBACK_TITLE_CHARS: usize = 5;

static PRIMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<article[^>]*>\s*<a[^>]*href="([^"]+)"[^>]*>.*?<h2>(.*?)</h2>(?:\s*<p[^>]*class="[^"]*date[^"]*"[^>]*>(.*?)</p>)?"#,
    )
    .unwrap()
});

static FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<article[^>]*>.*?<a[^>]*href="([^"]+)"[^>]*>.*?<h2[^>]*>(.*?)</h2>"#)
        .unwrap()
});

#[derive(Debug, Clone, Default)]
pub struct HtWatchSource;

impl HtWatchSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceAdapter for HtWatchSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    #[instrument(level = "info", skip_all, fields(source = SOURCE_ID))]
    async fn fetch(&self, http: &Http) -> Result<Vec<Article>, FetchError> {
        let base = Url::parse(PAGE_URL)?;
        let html = http.get_text(PAGE_URL).await?;
        let listed = parse_listing(&html, &base);
        if listed.is_empty() {
            warn!("No articles found on top page; layout may have changed");
        }

        let articles: Vec<Article> = stream::iter(listed)
            .then(move |article| summary::enrich(http, article))
            .collect()
            .await;

        info!(count = articles.len(), "Parsed ht-watch articles");
        Ok(articles)
    }
}

/// Extract the article list from the top page.
pub fn parse_listing(html: &str, base: &Url) -> Vec<Article> {
    let mut articles = Vec::new();

    for caps in PRIMARY.captures_iter(html) {
        let (Some(href), Some(title)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let title = clean_html(title.as_str());
        let Some(link) = resolve_link(base, href.as_str()) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }
        let published = caps
            .get(3)
            .map(|m| clean_html(m.as_str()))
            .filter(|d| !d.is_empty());
        articles.push(Article::new(title, link).with_published(published));
    }

    if articles.is_empty() {
        for caps in FALLBACK.captures_iter(html) {
            let (Some(href), Some(title)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let title = clean_html(title.as_str());
            if title.chars().count() < MIN_FALLBACK_TITLE_CHARS {
                continue;
            }
            if let Some(link) = resolve_link(base, href.as_str()) {
                articles.push(Article::new(title, link));
            }
        }
    }

    articles
}
