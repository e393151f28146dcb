//! RSS / Atom feed adapter.
//!
//! Handles RSS 2.0 and RSS 1.0 (RDF) `item` records and Atom `entry`
//! records. Element names are matched on their local part, so prefixed
//! dialects such as `rdf:`, `atom:` or `dc:` parse the same way.
//!
//! # Field Sources
//!
//! | Field | Tried in order |
//! |-------|----------------|
//! | title | `title` |
//! | link | `link` text, Atom `link@href` (alternate first), RDF `rdf:about` |
//! | date | `pubDate`, `published`, `updated`, `date` |
//! | summary | `description`, `summary`, `content` |

use crate::models::Article;
use crate::scrapers::{FetchError, Http, SourceAdapter};
use crate::utils::clean_html;
use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::{info, instrument};

const DATE_FIELDS: &[&str] = &["pubDate", "published", "updated", "date"];
const SUMMARY_FIELDS: &[&str] = &["description", "summary", "content"];

/// One configured feed URL.
#[derive(Debug, Clone)]
pub struct FeedSource {
    url: String,
}

impl FeedSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl SourceAdapter for FeedSource {
    fn id(&self) -> &str {
        &self.url
    }

    #[instrument(level = "info", skip_all, fields(url = %self.url))]
    async fn fetch(&self, http: &Http) -> Result<Vec<Article>, FetchError> {
        let body = http.get_text(&self.url).await?;
        let articles = parse_feed(&body)?;
        info!(count = articles.len(), "Parsed feed");
        Ok(articles)
    }
}

/// Fields collected for the record currently being read.
#[derive(Debug, Default)]
struct RawEntry {
    fields: HashMap<String, String>,
    /// `(rel, href)` pairs from Atom link elements.
    hrefs: Vec<(Option<String>, String)>,
    about: Option<String>,
}

impl RawEntry {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn link(&self) -> String {
        if let Some(link) = self.field("link") {
            return link.to_string();
        }
        let alternate = self
            .hrefs
            .iter()
            .find(|(rel, _)| rel.as_deref().is_none_or(|r| r == "alternate"))
            .or_else(|| self.hrefs.first());
        if let Some((_, href)) = alternate {
            return href.clone();
        }
        self.about.clone().unwrap_or_default()
    }

    fn into_article(self) -> Article {
        let title = self.field("title").map(clean_html).unwrap_or_default();
        let link = self.link();
        let published = DATE_FIELDS
            .iter()
            .find_map(|name| self.field(name))
            .map(str::to_string);
        let summary = SUMMARY_FIELDS
            .iter()
            .find_map(|name| self.field(name))
            .map(clean_html);
        Article::new(title, link)
            .with_published(published)
            .with_summary(summary)
    }
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn attribute(start: &BytesStart<'_>, name: &str) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name.as_bytes())
        .map(|attr| unescape_lossy(&String::from_utf8_lossy(&attr.value)).into_owned())
}

fn unescape_lossy(raw: &str) -> Cow<'_, str> {
    match quick_xml::escape::unescape(raw) {
        Ok(text) => text,
        Err(_) => Cow::Borrowed(raw),
    }
}

fn is_record(name: &str) -> bool {
    name == "item" || name == "entry"
}

/// Parse a feed document into articles, in document order.
///
/// Records missing a link are still returned (with an empty link) so the
/// caller can count them; the aggregator drops them.
pub fn parse_feed(xml: &str) -> Result<Vec<Article>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut articles = Vec::new();

    let mut entry: Option<RawEntry> = None;
    // Nesting depth below the record element.
    let mut depth = 0usize;
    let mut field: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                if let Some(current) = entry.as_mut() {
                    depth += 1;
                    if depth == 1 {
                        if name == "link" {
                            if let Some(href) = attribute(&e, "href") {
                                current.hrefs.push((attribute(&e, "rel"), href));
                            }
                        }
                        field = Some(name);
                        text.clear();
                    }
                } else if is_record(&name) {
                    entry = Some(RawEntry {
                        about: attribute(&e, "about"),
                        ..RawEntry::default()
                    });
                    depth = 0;
                }
            }
            Event::Empty(e) => {
                if let Some(current) = entry.as_mut() {
                    if depth == 0 && local_name(&e) == "link" {
                        if let Some(href) = attribute(&e, "href") {
                            current.hrefs.push((attribute(&e, "rel"), href));
                        }
                    }
                }
            }
            Event::Text(e) => {
                if entry.is_some() && depth >= 1 {
                    text.push_str(&unescape_lossy(&String::from_utf8_lossy(&e)));
                }
            }
            Event::CData(e) => {
                if entry.is_some() && depth >= 1 {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::GeneralRef(e) => {
                if entry.is_some() && depth >= 1 {
                    let reference = format!("&{};", String::from_utf8_lossy(&e));
                    text.push_str(&unescape_lossy(&reference));
                }
            }
            Event::End(_) => {
                if entry.is_some() && depth == 0 {
                    if let Some(done) = entry.take() {
                        articles.push(done.into_article());
                    }
                } else if let Some(current) = entry.as_mut() {
                    if depth == 1 {
                        let value = text.trim();
                        if let Some(name) = field.take().filter(|_| !value.is_empty()) {
                            current
                                .fields
                                .entry(name)
                                .or_insert_with(|| value.to_string());
                        }
                    }
                    depth -= 1;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(articles)
}
