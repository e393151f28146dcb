//! Run every configured source and merge what they return.
//!
//! Sources are awaited one after another, in configuration order. A source
//! that errors or panics contributes nothing; the rest of the run goes on.

use crate::models::Article;
use crate::scrapers::{Http, SourceAdapter};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

#[instrument(level = "info", skip_all, fields(sources = adapters.len()))]
pub async fn fetch_all(adapters: &[Box<dyn SourceAdapter>], http: &Http) -> Vec<Article> {
    let mut articles = Vec::new();

    for adapter in adapters {
        let t0 = Instant::now();
        let outcome = AssertUnwindSafe(adapter.fetch(http)).catch_unwind().await;
        let elapsed_ms = t0.elapsed().as_millis();

        match outcome {
            Ok(Ok(found)) => {
                let total = found.len();
                let linked: Vec<Article> =
                    found.into_iter().filter(|a| !a.link.is_empty()).collect();
                if linked.len() < total {
                    warn!(
                        source = adapter.id(),
                        dropped = total - linked.len(),
                        "Dropped articles without a link"
                    );
                }
                info!(source = adapter.id(), count = linked.len(), elapsed_ms, "Source done");
                articles.extend(linked);
            }
            Ok(Err(e)) => {
                warn!(source = adapter.id(), error = %e, elapsed_ms, "Source failed; skipping");
            }
            Err(_) => {
                error!(source = adapter.id(), elapsed_ms, "Source panicked; skipping");
            }
        }
    }

    info!(count = articles.len(), "Fetched articles from all sources");
    articles
}
