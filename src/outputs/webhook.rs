//! Digest delivery to a Slack-compatible incoming webhook.
//!
//! Delivery is behind the [`Notifier`] trait so the run orchestrator can be
//! driven by test doubles. The real implementation POSTs `{"text": ...}` and
//! treats any 2xx as success. There are no retries: a failed post leaves the
//! ledger untouched and the articles are picked up again by the next run.

use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("SLACK_WEBHOOK_URL is not set")]
    MissingWebhook,

    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {0}")]
    Status(u16),
}

/// Something that can deliver a finished digest.
pub trait Notifier {
    async fn post(&self, text: &str) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
struct Payload<'a> {
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
    timeout: Duration,
}

impl WebhookNotifier {
    /// `url` may be absent; posting then fails with
    /// [`DeliveryError::MissingWebhook`].
    pub fn new(client: reqwest::Client, url: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.filter(|u| !u.trim().is_empty()),
            timeout,
        }
    }
}

impl Notifier for WebhookNotifier {
    #[instrument(level = "info", skip_all, fields(chars = text.chars().count()))]
    async fn post(&self, text: &str) -> Result<(), DeliveryError> {
        let Some(url) = self.url.as_deref() else {
            warn!("Webhook URL is not configured; cannot post digest");
            return Err(DeliveryError::MissingWebhook);
        };

        let t0 = Instant::now();
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&Payload { text })
            .send()
            .await?;
        let status = response.status();
        let elapsed_ms = t0.elapsed().as_millis();

        if status.is_success() {
            info!(status = status.as_u16(), elapsed_ms, "Posted digest");
            Ok(())
        } else {
            warn!(status = status.as_u16(), elapsed_ms, "Webhook rejected digest");
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}
