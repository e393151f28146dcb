//! # Medtech News Digest
//!
//! Collects Japanese news from press-release feeds and a few medical IT news
//! sites, keeps the articles that are about both medicine and IT, removes
//! cross-source duplicates, and posts what has not been posted before to a
//! Slack-compatible webhook.
//!
//! ## Usage
//!
//! ```sh
//! SLACK_WEBHOOK_URL=https://hooks.slack.com/services/... medtech_news_digest
//! medtech_news_digest --dry-run --verbose
//! ```
//!
//! ## Architecture
//!
//! One run is one pass through the pipeline (see [`pipeline`]):
//! 1. **Fetching**: every configured source, one after another
//! 2. **Filtering**: medical ∩ IT keywords, minus exclusions
//! 3. **Deduplication**: by normalized link, then by fuzzy title match
//! 4. **Selection**: newest first, minus already-sent links, capped
//! 5. **Delivery**: post the digest, then record the links as sent

use chrono::Utc;
use clap::Parser;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregator;
mod cli;
mod config;
mod dedup;
mod filter;
mod models;
mod outputs;
mod pipeline;
mod rank;
mod scrapers;
mod storage;
mod utils;

use cli::Cli;
use config::Settings;
use outputs::webhook::WebhookNotifier;
use pipeline::RunOptions;
use scrapers::{Http, build_adapters, jst};
use utils::truncate_for_log;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    let settings = Settings::load(args.config.as_deref(), |key| std::env::var(key).ok());
    init_tracing(
        args.verbose,
        settings.as_ref().ok().and_then(|s| s.log_file.as_deref()),
    );
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let start_time = Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "medtech_news_digest starting up");
    debug!(?args, "Parsed CLI arguments");

    let http = match Http::new(settings.timeout()) {
        Ok(http) => http,
        Err(e) => {
            error!(error = %e, "Failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };
    let adapters = build_adapters(&settings);
    let notifier = WebhookNotifier::new(
        http.client().clone(),
        settings.webhook_url.clone(),
        settings.timeout(),
    );
    let options = RunOptions {
        dry_run: args.dry_run,
        manual: args.manual,
        max_items: args.max_items,
        storage_path: args.storage_path,
    };
    let now = Utc::now().with_timezone(&jst());

    match pipeline::run(&settings, &options, &adapters, &http, &notifier, now).await {
        Ok(report) => {
            if options.dry_run {
                println!("{}", report.message);
            } else {
                debug!(message = %truncate_for_log(&report.message, 300), "Posted digest");
            }
            info!(
                fetched = report.fetched,
                sent = report.articles.len(),
                persisted = report.persisted,
                elapsed_secs = start_time.elapsed().as_secs_f64(),
                "Run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

/// Console logging, plus a plain-text copy in `log_file` when configured.
///
/// `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool, log_file: Option<&Path>) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = tfmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(UtcTime::rfc_3339());

    let mut file_error = None;
    let file = log_file.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(
            tfmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(Mutex::new(file)),
        ),
        Err(e) => {
            file_error = Some((path.display().to_string(), e));
            None
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    if let Some((path, e)) = file_error {
        error!(%path, error = %e, "Failed to open log file; logging to console only");
    }
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
