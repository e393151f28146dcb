//! 医療テックニュース (medicaltech-news.com) top-page scraper.
//!
//! The top page lists the latest posts as `h3.item-ttl > a` headings, each
//! followed closely by a `<time datetime="...">`. When that layout is not
//! found, any `h2`/`h3` heading wrapping a link is taken instead, without a
//! date.

use crate::models::Article;
use crate::scrapers::{FetchError, Http, SourceAdapter, resolve_link, summary};
use crate::utils::{clean_html, window_after};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument, warn};
use url::Url;

pub const SOURCE_ID: &str = "medicaltech";

const PAGE_URL: &str = "https://medicaltech-news.com/";

/// How far past a heading to look for its `<time>` element, in bytes.
const TIME_LOOKAHEAD: usize = 400;

/// Fallback headings shorter than this are navigation, not articles.
const MIN_FALLBACK_TITLE_CHARS: usize = 5;

static PRIMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<h3[^>]*class="[^"]*item-ttl[^"]*"[^>]*>\s*<a[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
        .unwrap()
});

static FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<h[23][^>]*>\s*<a[^>]*href="([^"]+)"[^>]*>(.*?)</a>\s*</h[23]>"#).unwrap()
});

static TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<time[^>]*datetime="([^"]+)""#).unwrap());

#[derive(Debug, Clone, Default)]
pub struct MedicalTechSource;

impl MedicalTechSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceAdapter for MedicalTechSource {
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

        info!(count = articles.len(), "Parsed medicaltech-news articles");
        Ok(articles)
    }
}

/// Extract the article list from the top page.
pub fn parse_listing(html: &str, base: &Url) -> Vec<Article> {
    let mut articles = Vec::new();

    for caps in PRIMARY.captures_iter(html) {
        let (Some(whole), Some(href), Some(title)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let title = clean_html(title.as_str());
        let Some(link) = resolve_link(base, href.as_str()) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }
        let published = TIME
            .captures(window_after(html, whole.end(), TIME_LOOKAHEAD))
            .and_then(|t| t.get(1))
            .map(|m| m.as_str().trim().to_string());
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
