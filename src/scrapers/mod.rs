//! Source adapters that turn news feeds and news-site pages into [`Article`]s.
//!
//! Every adapter implements [`SourceAdapter`]. Adapters report failures as a
//! [`FetchError`]; it is the aggregator's job to log them and carry on with
//! the other sources.
//!
//! # Supported Sources
//!
//! | Identifier | Module | Method | Notes |
//! |------------|--------|--------|-------|
//! | (feed URL) | [`feed`] | RSS 1.0 / RSS 2.0 / Atom | One adapter per configured URL |
//! | `medicaltech` | [`medicaltech`] | HTML scraping | medicaltech-news.com top page |
//! | `htwatch` | [`htwatch`] | HTML scraping | ht-watch.com top page |
//! | `google_news` | [`google_news`] | Search RSS | Query "医療 IT", Japanese edition |
//!
//! Scraped listings carry no description, so those adapters follow each
//! article link once to pull one out (see [`summary`]).

use crate::config::Settings;
use crate::models::Article;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

pub mod feed;
pub mod google_news;
pub mod htwatch;
pub mod medicaltech;
pub mod summary;

pub use feed::FeedSource;
pub use google_news::GoogleNewsSource;
pub use htwatch::HtWatchSource;
pub use medicaltech::MedicalTechSource;

const USER_AGENT: &str = concat!("medtech_news_digest/", env!("CARGO_PKG_VERSION"));

/// Offset assumed for source dates that carry no zone.
const JST_OFFSET_SECS: i32 = 9 * 3600;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%Y年%m月%d日"];

/// Why a source produced nothing this run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Feed parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A single news source.
///
/// Implementations are object safe so that the configured set can be held
/// as `Vec<Box<dyn SourceAdapter>>`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short identifier used in logs.
    fn id(&self) -> &str;

    /// Fetch everything the source currently lists.
    async fn fetch(&self, http: &Http) -> Result<Vec<Article>, FetchError>;
}

/// Shared HTTP client with the configured per-request timeout.
#[derive(Debug, Clone)]
pub struct Http {
    client: reqwest::Client,
}

impl Http {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// GET `url` and return the body, treating any non-2xx status as an error.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

/// Build the configured adapters: one per feed URL, then the scraping
/// sources in configuration order.
///
/// Unknown scraping identifiers are logged and skipped.
pub fn build_adapters(settings: &Settings) -> Vec<Box<dyn SourceAdapter>> {
    let mut adapters: Vec<Box<dyn SourceAdapter>> = settings
        .feed_urls
        .iter()
        .map(|url| Box::new(FeedSource::new(url.clone())) as Box<dyn SourceAdapter>)
        .collect();

    let mut seen: Vec<String> = Vec::new();
    for raw in &settings.extra_sources {
        let adapter: Box<dyn SourceAdapter> = match raw.trim().to_lowercase().as_str() {
            "medicaltech" | "medicaltech-news" => Box::new(MedicalTechSource::new()),
            "htwatch" | "ht-watch" => Box::new(HtWatchSource::new()),
            "google_news" | "googlenews" | "google-news" => {
                Box::new(GoogleNewsSource::default())
            }
            _ => {
                warn!(source = %raw, "Unknown scraping source; skipping");
                continue;
            }
        };
        if seen.iter().any(|id| id == adapter.id()) {
            debug!(source = adapter.id(), "Scraping source listed twice; keeping the first");
            continue;
        }
        seen.push(adapter.id().to_string());
        adapters.push(adapter);
    }
    adapters
}

/// The fixed zone naive source dates are read in.
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).unwrap()
}

/// Parse a source date string.
///
/// Zoned formats (RFC 2822, RFC 3339) keep their own offset; naive ones are
/// read as JST.
///
/// # Arguments
///
/// * `value` - Date text as found in a feed or on a page, surrounding
///   whitespace allowed
///
/// # Returns
///
/// The parsed instant, or `None` when no known format matches.
///
/// # Examples
///
/// ```ignore
/// let zoned = parse_datetime("Mon, 15 Jan 2024 09:00:00 +0900");
/// let naive = parse_datetime("2024/01/15"); // midnight JST
/// assert!(parse_datetime("yesterday").is_none());
/// ```
pub fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return jst().from_local_datetime(&naive).single();
        }
    }
    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return jst().from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single();
        }
    }
    None
}

/// Resolve `href` against the page it was found on.
pub(crate) fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}
