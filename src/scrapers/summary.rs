//! Pull a description for an article out of its own page.
//!
//! Scraped listings only give a title and a link. For those articles the
//! adapter fetches the article page once and looks, in order, for:
//!
//! 1. `<meta name="description">`, then `<meta property="og:description">`,
//!    unless it is one of the sites' boilerplate descriptions
//! 2. the first long paragraph inside `article.entry`
//! 3. the first long paragraph inside the first `div` whose class mentions a
//!    typical body container name
//! 4. the first long paragraph anywhere on the page
//!
//! Any failure leaves the article as it was.

use crate::models::Article;
use crate::scrapers::Http;
use crate::utils::{clean_html, collapse_whitespace};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

/// Summaries shorter than this are treated as missing.
pub const MIN_SUMMARY_CHARS: usize = 20;

/// A paragraph needs at least this many characters to count as body text.
const MIN_PARAGRAPH_CHARS: usize = 50;

/// Fixed substrings of the site-wide descriptions some pages repeat.
const BOILERPLATE_MARKERS: &[&str] = &["クリッピングサイト", "HealthTechWatchサイトは"];

const BODY_CONTAINER_CLASSES: &[&str] = &[
    "main",
    "content",
    "post-content",
    "article-body",
    "entry-content",
];

pub fn needs_summary(article: &Article) -> bool {
    article
        .summary
        .as_deref()
        .is_none_or(|s| s.chars().count() < MIN_SUMMARY_CHARS)
}

/// Fill in a missing or thin summary from the article page.
#[instrument(level = "debug", skip_all, fields(link = %article.link))]
pub async fn enrich(http: &Http, article: Article) -> Article {
    if !needs_summary(&article) {
        return article;
    }
    match http.get_text(&article.link).await {
        Ok(body) => match extract_summary(&body) {
            Some(summary) => article.with_summary(Some(summary)),
            None => {
                debug!("No usable description on article page");
                article
            }
        },
        Err(e) => {
            debug!(error = %e, "Article page fetch failed; keeping listing data");
            article
        }
    }
}

/// Find the best description in an article page.
pub fn extract_summary(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    if let Some(description) = meta_description(&document) {
        return Some(description);
    }

    let paragraph = Selector::parse("p").ok()?;

    let entry = Selector::parse("article.entry").ok()?;
    if let Some(found) = document
        .select(&entry)
        .next()
        .and_then(|el| first_long_paragraph(el, &paragraph))
    {
        return Some(found);
    }

    for class in BODY_CONTAINER_CLASSES {
        let container = Selector::parse(&format!(r#"div[class*="{class}"]"#)).ok()?;
        if let Some(found) = document
            .select(&container)
            .next()
            .and_then(|el| first_long_paragraph(el, &paragraph))
        {
            return Some(found);
        }
    }

    first_long_paragraph(document.root_element(), &paragraph)
}

fn meta_description(document: &Html) -> Option<String> {
    let meta = Selector::parse("meta").ok()?;
    let content_of = |attr: &str, value: &str| {
        document
            .select(&meta)
            .find(|el| {
                el.value()
                    .attr(attr)
                    .is_some_and(|v| v.eq_ignore_ascii_case(value))
            })
            .and_then(|el| el.value().attr("content"))
            .map(clean_html)
    };

    let description =
        content_of("name", "description").or_else(|| content_of("property", "og:description"))?;
    if description.chars().count() > MIN_SUMMARY_CHARS && !is_boilerplate(&description) {
        Some(description)
    } else {
        None
    }
}

fn is_boilerplate(description: &str) -> bool {
    BOILERPLATE_MARKERS
        .iter()
        .any(|marker| description.contains(marker))
}

fn first_long_paragraph(scope: ElementRef<'_>, paragraph: &Selector) -> Option<String> {
    scope
        .select(paragraph)
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .find(|text| text.chars().count() >= MIN_PARAGRAPH_CHARS)
}
