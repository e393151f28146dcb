//! Google News search adapter.
//!
//! Uses the public search RSS endpoint for the Japanese edition, so the
//! parsing is the same as any other feed. Links point at news.google.com
//! redirect pages, which is why these articles lose every duplicate
//! contest against the original publishers.

use crate::models::Article;
use crate::scrapers::feed::parse_feed;
use crate::scrapers::{FetchError, Http, SourceAdapter};
use async_trait::async_trait;
use tracing::{info, instrument};

pub const SOURCE_ID: &str = "google_news";

const DEFAULT_QUERY: &str = "医療 IT";

#[derive(Debug, Clone)]
pub struct GoogleNewsSource {
    query: String,
}

impl GoogleNewsSource {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    pub fn feed_url(&self) -> String {
        format!(
            "https://news.google.com/rss/search?q={}&hl=ja&gl=JP&ceid=JP:ja",
            urlencoding::encode(&self.query)
        )
    }
}

impl Default for GoogleNewsSource {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY)
    }
}

#[async_trait]
impl SourceAdapter for GoogleNewsSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    #[instrument(level = "info", skip_all, fields(source = SOURCE_ID, query = %self.query))]
    async fn fetch(&self, http: &Http) -> Result<Vec<Article>, FetchError> {
        let body = http.get_text(&self.feed_url()).await?;
        let articles = parse_feed(&body)?;
        info!(count = articles.len(), "Fetched Google News results");
        Ok(articles)
    }
}
