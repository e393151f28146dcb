//! Run configuration.
//!
//! [`Settings`] is built once at startup and handed by reference to every
//! stage. Values come from, in increasing precedence:
//!
//! 1. built-in defaults
//! 2. an optional YAML file (every key optional)
//! 3. environment variables (a `.env` file is loaded by `main` first)
//!
//! CLI overrides for the ledger path and item cap are applied by the
//! pipeline, not here.
//!
//! # Environment Variables
//!
//! | Variable | Field | Format |
//! |----------|-------|--------|
//! | `SLACK_WEBHOOK_URL` | `webhook_url` | URL |
//! | `PRTIMES_RSS_URLS` | `feed_urls` | comma separated; empty keeps the default |
//! | `EXTRA_SOURCES` | `extra_sources` | comma separated identifiers |
//! | `MEDICAL_KEYWORDS` | `medical_keywords` | comma separated |
//! | `IT_KEYWORDS` | `it_keywords` | comma separated |
//! | `EXCLUDE_KEYWORDS` | `exclude_keywords` | comma separated |
//! | `EXCLUDE_DOMAINS` | `exclude_domains` | comma separated |
//! | `FETCH_TIMEOUT` | `fetch_timeout_secs` | seconds |
//! | `MAX_ARTICLES_PER_POST` | `max_items` | count |
//! | `SENT_URLS_PATH` | `storage_path` | path |
//! | `LOG_FILE` | `log_file` | path |

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_FEED_URL: &str = "https://prtimes.jp/index.rdf";
pub const DEFAULT_STORAGE_PATH: &str = "data/sent_urls.json";

const DEFAULT_EXTRA_SOURCES: &[&str] = &["medicaltech", "htwatch", "google_news"];

const DEFAULT_MEDICAL_KEYWORDS: &[&str] = &[
    "医療",
    "ヘルスケア",
    "診療",
    "病院",
    "歯科",
    "看護",
    "クリニック",
    "製薬",
];

const DEFAULT_IT_KEYWORDS: &[&str] = &[
    "AI",
    "IT",
    "DX",
    "デジタル",
    "電子カルテ",
    "システム",
    "SaaS",
    "クラウド",
    "アプリ",
];

const DEFAULT_EXCLUDE_KEYWORDS: &[&str] = &["美容整形", "ダイエットサプリ", "エステ"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

/// Everything a run needs to know, fixed for the lifetime of the run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Incoming webhook for live delivery.
    pub webhook_url: Option<String>,
    pub feed_urls: Vec<String>,
    /// Scraping source identifiers (see `scrapers::build_adapters`).
    pub extra_sources: Vec<String>,
    pub medical_keywords: Vec<String>,
    pub it_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub exclude_domains: Vec<String>,
    pub fetch_timeout_secs: u64,
    /// Cap on articles per digest in scheduled runs.
    pub max_items: usize,
    /// Delivery ledger location.
    pub storage_path: PathBuf,
    pub log_file: Option<PathBuf>,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            feed_urls: vec![DEFAULT_FEED_URL.to_string()],
            extra_sources: owned(DEFAULT_EXTRA_SOURCES),
            medical_keywords: owned(DEFAULT_MEDICAL_KEYWORDS),
            it_keywords: owned(DEFAULT_IT_KEYWORDS),
            exclude_keywords: owned(DEFAULT_EXCLUDE_KEYWORDS),
            exclude_domains: Vec::new(),
            fetch_timeout_secs: 10,
            max_items: 20,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            log_file: None,
        }
    }
}

impl Settings {
    /// Resolve settings from an optional YAML file and an environment lookup.
    ///
    /// `env` is usually `|key| std::env::var(key).ok()`.
    pub fn load<F>(config_file: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match config_file {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(env)?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Overlay environment variables onto these settings.
    pub fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = env("SLACK_WEBHOOK_URL") {
            let url = url.trim().to_string();
            self.webhook_url = (!url.is_empty()).then_some(url);
        }
        if let Some(raw) = env("PRTIMES_RSS_URLS") {
            let feeds = split_list(&raw);
            if !feeds.is_empty() {
                self.feed_urls = feeds;
            }
        }
        if let Some(raw) = env("EXTRA_SOURCES") {
            self.extra_sources = split_list(&raw);
        }
        if let Some(raw) = env("MEDICAL_KEYWORDS") {
            self.medical_keywords = split_list(&raw);
        }
        if let Some(raw) = env("IT_KEYWORDS") {
            self.it_keywords = split_list(&raw);
        }
        if let Some(raw) = env("EXCLUDE_KEYWORDS") {
            self.exclude_keywords = split_list(&raw);
        }
        if let Some(raw) = env("EXCLUDE_DOMAINS") {
            self.exclude_domains = split_list(&raw);
        }
        if let Some(raw) = env("FETCH_TIMEOUT") {
            self.fetch_timeout_secs = parse_positive("FETCH_TIMEOUT", &raw)?;
        }
        if let Some(raw) = env("MAX_ARTICLES_PER_POST") {
            self.max_items = parse_positive("MAX_ARTICLES_PER_POST", &raw)?;
        }
        if let Some(raw) = env("SENT_URLS_PATH").filter(|p| !p.trim().is_empty()) {
            self.storage_path = PathBuf::from(raw.trim());
        }
        if let Some(raw) = env("LOG_FILE") {
            let raw = raw.trim();
            self.log_file = (!raw.is_empty()).then(|| PathBuf::from(raw));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Split a comma separated value, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        }),
    }
}
