//! One digest run, from fetching to recording what was sent.
//!
//! ```text
//! fetch → filter → dedupe → rank → drop already-sent → cap → format
//!       → print (dry run) | post → save ledger
//! ```
//!
//! Scheduled runs skip anything in the ledger and cap at the configured
//! maximum. Manual runs ignore the ledger when choosing, never include Google
//! News, and cap at [`MANUAL_MAX_ITEMS`]; what they post is still recorded so
//! the next scheduled run does not repeat it.

use crate::aggregator::fetch_all;
use crate::config::Settings;
use crate::dedup::deduplicate;
use crate::filter::TopicFilter;
use crate::models::{Article, SourceKind};
use crate::outputs::digest::build_message;
use crate::outputs::webhook::{DeliveryError, Notifier};
use crate::rank::newest_first;
use crate::scrapers::{Http, SourceAdapter, jst};
use crate::storage::{Ledger, is_sent, load_ledger, record_sent, save_ledger};
use chrono::{DateTime, FixedOffset};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Item cap for manual runs, regardless of configuration.
pub const MANUAL_MAX_ITEMS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Scheduled,
    Manual,
}

/// Per-invocation switches, usually straight from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub manual: bool,
    /// Overrides the configured cap in scheduled runs. Zero means unset.
    pub max_items: Option<usize>,
    /// Overrides the configured ledger path.
    pub storage_path: Option<PathBuf>,
}

impl RunOptions {
    pub fn mode(&self) -> Mode {
        if self.manual {
            Mode::Manual
        } else {
            Mode::Scheduled
        }
    }

    fn cap(&self, settings: &Settings) -> usize {
        match self.mode() {
            Mode::Manual => MANUAL_MAX_ITEMS,
            Mode::Scheduled => self
                .max_items
                .filter(|&n| n > 0)
                .unwrap_or(settings.max_items),
        }
    }

    fn storage_path(&self, settings: &Settings) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(|| settings.storage_path.clone())
    }
}

/// What a run did.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Articles returned by all sources together.
    pub fetched: usize,
    /// Articles in the digest, in digest order.
    pub articles: Vec<Article>,
    pub message: String,
    pub delivered: bool,
    /// Ledger entries written after delivery.
    pub persisted: usize,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("No sources configured; set PRTIMES_RSS_URLS or EXTRA_SOURCES")]
    NoSources,

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Choose the articles for this run's digest from ranked candidates.
pub fn select_articles(
    candidates: Vec<Article>,
    ledger: &Ledger,
    mode: Mode,
    cap: usize,
) -> Vec<Article> {
    candidates
        .into_iter()
        .filter(|a| match mode {
            Mode::Scheduled => !is_sent(ledger, &a.link),
            Mode::Manual => a.source_kind() != SourceKind::GoogleNews,
        })
        .take(cap)
        .collect()
}

/// Run the digest once: fetch, filter, dedupe, select, post, then record.
///
/// Sources that fail contribute nothing and are logged. Once the post
/// succeeds the run succeeds, even if the ledger cannot be written; in that
/// case [`RunReport::persisted`] stays 0.
///
/// # Arguments
///
/// * `settings` - Resolved configuration
/// * `options` - Per-run switches (dry run, manual mode, overrides)
/// * `adapters` - Sources to fetch, in priority order
/// * `http` - Shared client handed to every adapter
/// * `notifier` - Where the digest is posted
/// * `now` - Clock reading used for the header and ledger timestamps
///
/// # Returns
///
/// A [`RunReport`] describing what was selected and sent, or a [`RunError`]
/// when no source is configured or the post is rejected.
///
/// # Examples
///
/// ```ignore
/// let adapters = build_adapters(&settings);
/// let report = pipeline::run(&settings, &options, &adapters, &http, &notifier, now).await?;
/// info!(sent = report.articles.len(), "Done");
/// ```
#[instrument(level = "info", skip_all, fields(mode = ?options.mode(), dry_run = options.dry_run))]
pub async fn run<N: Notifier>(
    settings: &Settings,
    options: &RunOptions,
    adapters: &[Box<dyn SourceAdapter>],
    http: &Http,
    notifier: &N,
    now: DateTime<FixedOffset>,
) -> Result<RunReport, RunError> {
    if adapters.is_empty() {
        error!("No sources configured");
        return Err(RunError::NoSources);
    }

    let fetched = fetch_all(adapters, http).await;
    if fetched.is_empty() {
        warn!("No articles fetched from any source");
    }

    let filter = TopicFilter::from_settings(settings);
    let hits = filter.keyword_hits(&fetched);
    info!(
        medical = hits.medical,
        it = hits.it,
        both = hits.both,
        "Keyword hits before exclusions"
    );

    let filtered = filter.apply(&fetched);
    let ranked = newest_first(deduplicate(filtered));

    let storage_path = options.storage_path(settings);
    let mut ledger = load_ledger(&storage_path).await;
    let cap = options.cap(settings);
    let candidates = ranked.len();
    let selected = select_articles(ranked, &ledger, options.mode(), cap);
    info!(candidates, selected = selected.len(), cap, "Selected articles for digest");

    let message = build_message(&selected, now);
    let mut report = RunReport {
        fetched: fetched.len(),
        articles: selected,
        message,
        delivered: false,
        persisted: 0,
    };

    if options.dry_run {
        info!("Dry run; digest not posted and ledger not updated");
        return Ok(report);
    }

    notifier.post(&report.message).await?;
    report.delivered = true;

    if report.articles.is_empty() {
        return Ok(report);
    }

    let sent_at = now.with_timezone(&jst()).to_rfc3339();
    let recorded = record_sent(&mut ledger, &report.articles, &sent_at);
    match save_ledger(&ledger, &storage_path).await {
        Ok(()) => {
            report.persisted = recorded;
            info!(recorded, path = %storage_path.display(), "Recorded sent articles");
        }
        Err(e) => {
            // The digest is already out; a lost ledger only risks a repeat.
            error!(error = %e, path = %storage_path.display(), "Failed to save ledger");
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::digest::EMPTY_MESSAGE;
    use crate::scrapers::FetchError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    struct InMemory(Vec<Article>);

    #[async_trait]
    impl SourceAdapter for InMemory {
        fn id(&self) -> &str {
            "in-memory"
        }

        async fn fetch(&self, _http: &Http) -> Result<Vec<Article>, FetchError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    impl Recording {
        fn posts(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Notifier for Recording {
        async fn post(&self, text: &str) -> Result<(), DeliveryError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Rejecting;

    impl Notifier for Rejecting {
        async fn post(&self, _text: &str) -> Result<(), DeliveryError> {
            Err(DeliveryError::Status(500))
        }
    }

    const TITLES: [&str; 8] = [
        "医療AIシステム導入",
        "病院向けクラウド電子カルテ",
        "歯科医院のDX推進",
        "看護記録アプリを提供開始",
        "製薬企業がデジタル基盤を刷新",
        "クリニック予約SaaSが登場",
        "ヘルスケアIT人材の育成",
        "診療報酬改定とシステム対応",
    ];

    fn prtimes(i: usize) -> Article {
        Article::new(TITLES[i], format!("https://prtimes.jp/x/{}", i + 1))
    }

    fn source(articles: Vec<Article>) -> Vec<Box<dyn SourceAdapter>> {
        vec![Box::new(InMemory(articles))]
    }

    fn settings(ledger: &Path) -> Settings {
        Settings {
            storage_path: ledger.to_path_buf(),
            ..Settings::default()
        }
    }

    fn http() -> Http {
        Http::new(Duration::from_secs(1)).unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-15T09:00:00+09:00").unwrap()
    }

    fn links(articles: &[Article]) -> Vec<&str> {
        articles.iter().map(|a| a.link.as_str()).collect()
    }

    #[tokio::test]
    async fn test_no_sources_is_fatal() {
        let dir = tempdir().unwrap();
        let err = run(
            &settings(&dir.path().join("sent.json")),
            &RunOptions::default(),
            &[],
            &http(),
            &Recording::default(),
            now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RunError::NoSources));
    }

    #[tokio::test]
    async fn test_excluded_keyword_end_to_end() {
        let dir = tempdir().unwrap();
        let adapters = source(vec![
            Article::new("医療AIシステム導入", "https://prtimes.jp/x/1"),
            Article::new("美容整形の新技術", "https://prtimes.jp/x/2"),
        ]);
        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };
        let report = run(
            &settings(&dir.path().join("sent.json")),
            &options,
            &adapters,
            &http(),
            &Recording::default(),
            now(),
        )
        .await
        .unwrap();
        assert_eq!(report.fetched, 2);
        assert_eq!(links(&report.articles), vec!["https://prtimes.jp/x/1"]);
    }

    #[tokio::test]
    async fn test_second_scheduled_run_finds_nothing_new() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir.path().join("sent.json"));
        let adapters = source((0..3).map(prtimes).collect());
        let notifier = Recording::default();

        let first = run(&settings, &RunOptions::default(), &adapters, &http(), &notifier, now())
            .await
            .unwrap();
        assert_eq!(first.articles.len(), 3);
        assert_eq!(first.persisted, 3);

        let second = run(&settings, &RunOptions::default(), &adapters, &http(), &notifier, now())
            .await
            .unwrap();
        assert!(second.articles.is_empty());
        assert_eq!(second.persisted, 0);
        assert_eq!(notifier.posts().len(), 2);
        assert_eq!(notifier.posts()[1], EMPTY_MESSAGE);
    }

    #[tokio::test]
    async fn test_ledger_entry_excludes_article_and_ledger_is_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sent.json");
        let original = r#"{"https://prtimes.jp/x/1": "2024-01-01T00:00:00+09:00"}"#;
        std::fs::write(&path, original).unwrap();

        let report = run(
            &settings(&path),
            &RunOptions::default(),
            &source(vec![prtimes(0)]),
            &http(),
            &Recording::default(),
            now(),
        )
        .await
        .unwrap();
        assert!(report.articles.is_empty());
        assert_eq!(report.message, EMPTY_MESSAGE);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }

    #[tokio::test]
    async fn test_manual_mode_drops_google_news_and_caps_at_five() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sent.json");
        let mut articles = vec![Article::new(
            "オンライン診療のクラウド基盤が拡大",
            "https://news.google.com/rss/articles/abc",
        )];
        articles.extend((0..7).map(prtimes));
        // Already sent earlier; manual runs pick it anyway.
        std::fs::write(&path, r#"{"https://prtimes.jp/x/1": "2024-01-01T00:00:00+09:00"}"#)
            .unwrap();

        let options = RunOptions {
            manual: true,
            max_items: Some(20),
            ..RunOptions::default()
        };
        let notifier = Recording::default();
        let report = run(
            &settings(&path),
            &options,
            &source(articles),
            &http(),
            &notifier,
            now(),
        )
        .await
        .unwrap();

        assert_eq!(report.articles.len(), MANUAL_MAX_ITEMS);
        assert!(
            report
                .articles
                .iter()
                .all(|a| a.source_kind() == SourceKind::PrTimes)
        );
        assert_eq!(report.articles[0].link, "https://prtimes.jp/x/1");
        assert!(!notifier.posts()[0].contains("news.google.com"));

        let ledger = load_ledger(&path).await;
        assert_eq!(ledger.len(), MANUAL_MAX_ITEMS);
        assert_eq!(ledger["https://prtimes.jp/x/2"], "2024-01-15T09:00:00+09:00");
    }

    #[tokio::test]
    async fn test_scheduled_cap_and_override() {
        let dir = tempdir().unwrap();
        let adapters = source((0..8).map(prtimes).collect());
        let mut settings = settings(&dir.path().join("sent.json"));
        settings.max_items = 6;

        let dry = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };
        let report = run(&settings, &dry, &adapters, &http(), &Recording::default(), now())
            .await
            .unwrap();
        assert_eq!(report.articles.len(), 6);

        let capped = RunOptions {
            dry_run: true,
            max_items: Some(2),
            ..RunOptions::default()
        };
        let report = run(&settings, &capped, &adapters, &http(), &Recording::default(), now())
            .await
            .unwrap();
        assert_eq!(report.articles.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sent.json");
        let err = run(
            &settings(&path),
            &RunOptions::default(),
            &source(vec![prtimes(0)]),
            &http(),
            &Rejecting,
            now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RunError::Delivery(DeliveryError::Status(500))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unwritable_ledger_still_delivers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger");
        std::fs::create_dir(&path).unwrap();
        let adapters = source((0..2).map(prtimes).collect());
        let notifier = Recording::default();

        let settings = settings(&path);

        let report = run(&settings, &RunOptions::default(), &adapters, &http(), &notifier, now())
            .await
            .unwrap();
        assert!(report.delivered);
        assert_eq!(report.articles.len(), 2);
        assert_eq!(report.persisted, 0);
        assert_eq!(notifier.posts().len(), 1);
        assert!(path.is_dir());
        assert!(!dir.path().join("ledger.tmp").exists());
    }

    #[tokio::test]
    async fn test_dry_run_neither_posts_nor_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sent.json");
        let notifier = Recording::default();
        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };
        let adapters = source(vec![prtimes(0)]);
        let report = run(&settings(&path), &options, &adapters, &http(), &notifier, now())
            .await
            .unwrap();
        assert!(!report.delivered);
        assert_eq!(report.articles.len(), 1);
        assert!(report.message.contains("https://prtimes.jp/x/1"));
        assert!(notifier.posts().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cross_source_duplicate_resolved_and_ordered() {
        let dir = tempdir().unwrap();
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(InMemory(vec![
                Article::new("看護記録アプリを提供開始", "https://news.google.com/rss/articles/n1")
                    .with_published(Some("2024-01-14T10:00:00+09:00".to_string())),
            ])),
            Box::new(InMemory(vec![
                Article::new("看護記録アプリを提供開始", "https://prtimes.jp/x/9")
                    .with_published(Some("2024-01-14T10:00:00+09:00".to_string())),
                Article::new("医療AIシステム導入", "https://ht-watch.com/a/1")
                    .with_published(Some("2024-01-15 08:00".to_string())),
            ])),
        ];
        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };
        let report = run(
            &settings(&dir.path().join("sent.json")),
            &options,
            &adapters,
            &http(),
            &Recording::default(),
            now(),
        )
        .await
        .unwrap();
        assert_eq!(
            links(&report.articles),
            vec!["https://ht-watch.com/a/1", "https://prtimes.jp/x/9"]
        );
    }

    #[test]
    fn test_select_articles_scheduled_uses_ledger() {
        let mut ledger = Ledger::new();
        ledger.insert("https://prtimes.jp/x/1".to_string(), "t".to_string());
        let chosen = select_articles(
            vec![prtimes(0), prtimes(1), prtimes(2)],
            &ledger,
            Mode::Scheduled,
            1,
        );
        assert_eq!(links(&chosen), vec!["https://prtimes.jp/x/2"]);
    }

    #[test]
    fn test_zero_max_items_falls_back_to_settings() {
        let options = RunOptions {
            max_items: Some(0),
            ..RunOptions::default()
        };
        assert_eq!(options.cap(&Settings::default()), 20);
    }
}
