//! Command-line interface definitions for the digest runner.
//!
//! Flags only override what a single run does. Everything else comes from
//! the environment or the optional YAML file (see [`crate::config`]).

use clap::Parser;
use std::path::PathBuf;

/// Post a digest of new medical × IT news to a chat webhook.
///
/// # Examples
///
/// ```sh
/// # Preview the next digest without posting or recording anything
/// medtech_news_digest --dry-run
///
/// # Hand-picked run: no Google News, at most five articles
/// medtech_news_digest --manual
///
/// # Alternate ledger and a smaller post
/// medtech_news_digest --storage-path /var/lib/digest/sent.json --max-items 10
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Print the digest instead of posting it; the ledger is not updated
    #[arg(long)]
    pub dry_run: bool,

    /// Ledger file recording already-sent article links
    #[arg(long)]
    pub storage_path: Option<PathBuf>,

    /// Maximum number of articles per post (scheduled runs only)
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Manual run: ignore the ledger when choosing, skip Google News, post at most five
    #[arg(long)]
    pub manual: bool,

    /// Optional path to a YAML settings file
    #[arg(short, long, env = "NEWS_DIGEST_CONFIG")]
    pub config: Option<PathBuf>,
}
