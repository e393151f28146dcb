//! Delivery ledger: which article links have already been posted.
//!
//! The ledger is a JSON object mapping a link to the time it was sent:
//!
//! ```json
//! {
//!   "https://prtimes.jp/main/html/rd/p/000000001.000000001.html": "2024-01-15T09:00:00+09:00"
//! }
//! ```
//!
//! Loading never fails: a missing, unreadable, or malformed file is an empty
//! ledger. Saving writes a sibling `.tmp` file and renames it over the
//! destination.

use crate::dedup::normalize_url;
use crate::models::Article;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

/// Link → ISO-8601 send time.
pub type Ledger = BTreeMap<String, String>;

/// Read the ledger at `path`.
///
/// # Returns
///
/// The stored entries, or an empty ledger when the file is missing,
/// unreadable, or not a JSON object.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_ledger(path: &Path) -> Ledger {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ledger::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read ledger; starting fresh");
            return Ledger::new();
        }
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => {
            let ledger: Ledger = map
                .into_iter()
                .map(|(link, sent)| {
                    let sent = match sent {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (link, sent)
                })
                .collect();
            info!(entries = ledger.len(), "Loaded ledger");
            ledger
        }
        Ok(other) => {
            warn!(found = json_kind(&other), "Ledger is not a JSON object; starting fresh");
            Ledger::new()
        }
        Err(e) => {
            warn!(error = %e, "Failed to decode ledger; starting fresh");
            Ledger::new()
        }
    }
}

/// Write `ledger` to `path`, creating parent directories as needed.
///
/// The JSON goes to a sibling `.tmp` file first and is then renamed over
/// `path`, so a reader never sees a half-written ledger. If the rename fails
/// the `.tmp` file is removed again.
///
/// # Arguments
///
/// * `ledger` - The full ledger to persist
/// * `path` - Destination file
///
/// # Returns
///
/// `Ok(())` once the file is in place, or the first I/O or encoding error.
///
/// # Examples
///
/// ```ignore
/// let mut ledger = load_ledger(path).await;
/// record_sent(&mut ledger, &articles, &now.to_rfc3339());
/// save_ledger(&ledger, path).await?;
/// ```
#[instrument(level = "info", skip_all, fields(path = %path.display(), entries = ledger.len()))]
pub async fn save_ledger(ledger: &Ledger, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(ledger)?;
    let tmp = tmp_path(path);
    fs::write(&tmp, json).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    info!("Saved ledger");
    Ok(())
}

/// Whether `link` was sent before, under its raw or normalized form.
pub fn is_sent(ledger: &Ledger, link: &str) -> bool {
    ledger.contains_key(link) || ledger.contains_key(&normalize_url(link))
}

/// Record `articles` as sent at `timestamp`, keyed by normalized link.
pub fn record_sent(ledger: &mut Ledger, articles: &[Article], timestamp: &str) -> usize {
    let mut recorded = 0;
    for article in articles {
        let key = normalize_url(&article.link);
        if key.is_empty() {
            continue;
        }
        ledger.insert(key, timestamp.to_string());
        recorded += 1;
    }
    recorded
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
