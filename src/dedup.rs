//! Cross-source duplicate removal.
//!
//! Two passes, in this order:
//!
//! 1. **URL pass**: links are normalized (query string and trailing slash
//!    removed) and only the first article per normalized link is kept.
//! 2. **Title pass**: each article is compared with every article accepted so
//!    far using [`title_similarity`]. On the first pair scoring at least
//!    [`DUPLICATE_THRESHOLD`], the article from the higher priority source
//!    (see [`SourceKind::priority`]) is kept. A newcomer that wins replaces
//!    the accepted article and moves to the end of the list.
//!
//! The similarity score is a heuristic; the constants below are tuned values
//! rather than derived ones.

use crate::models::{Article, SourceKind};
use std::collections::HashSet;
use tracing::{debug, info};

/// Scores at or above this mark two titles as the same story.
pub const DUPLICATE_THRESHOLD: f64 = 0.75;

/// Containment only counts when the shorter title has this many characters.
const CONTAINMENT_MIN_CHARS: usize = 10;

/// Lowest score given to a contained title.
const CONTAINMENT_FLOOR: f64 = 0.7;

/// Prefix comparison only counts when the shorter title has this many
/// characters.
const PREFIX_MIN_CHARS: usize = 5;

/// Share of the shorter title that must match as a prefix.
const PREFIX_RATIO: f64 = 0.8;

const PREFIX_SCORE: f64 = 0.75;

const JACCARD_WEIGHT: f64 = 0.5;
const LENGTH_WEIGHT: f64 = 0.3;
const TRIGRAM_BONUS: f64 = 0.2;

/// Normalize a link for comparison and for ledger keys.
///
/// ```ignore
/// assert_eq!(normalize_url("https://prtimes.jp/a/?utm=x"), "https://prtimes.jp/a");
/// ```
pub fn normalize_url(link: &str) -> String {
    let link = link.trim();
    let without_query = link.split_once('?').map_or(link, |(head, _)| head);
    without_query.trim_end_matches('/').to_string()
}

/// Lowercase and keep only word characters.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Similarity of two titles in `[0, 1]`.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    normalized_similarity(&normalize_title(a), &normalize_title(b))
}

fn normalized_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let (shorter, shorter_len, longer, longer_len) = if a_len <= b_len {
        (a, a_len, b, b_len)
    } else {
        (b, b_len, a, a_len)
    };
    let length_ratio = shorter_len as f64 / longer_len as f64;

    if shorter_len >= CONTAINMENT_MIN_CHARS && longer.contains(shorter) {
        return length_ratio.max(CONTAINMENT_FLOOR);
    }

    if shorter_len >= PREFIX_MIN_CHARS {
        let prefix_len = (shorter_len as f64 * PREFIX_RATIO) as usize;
        if shorter.chars().take(prefix_len).eq(longer.chars().take(prefix_len)) {
            return PREFIX_SCORE;
        }
    }

    let a_chars: HashSet<char> = a.chars().collect();
    let b_chars: HashSet<char> = b.chars().collect();
    let shared = a_chars.intersection(&b_chars).count();
    if shared == 0 {
        return 0.0;
    }
    let jaccard = shared as f64 / a_chars.union(&b_chars).count() as f64;

    let mut score = JACCARD_WEIGHT * jaccard + LENGTH_WEIGHT * length_ratio;
    if shares_trigram(a, b) {
        score += TRIGRAM_BONUS;
    }
    score.min(1.0)
}

fn shares_trigram(a: &str, b: &str) -> bool {
    let chars: Vec<char> = a.chars().collect();
    chars
        .windows(3)
        .any(|w| b.contains(&w.iter().collect::<String>()))
}

/// Keep the first article per normalized link, dropping link-less ones.
///
/// # Arguments
///
/// * `articles` - Articles in priority order; the earliest copy of a link wins
///
/// # Returns
///
/// The surviving articles in their original relative order.
///
/// # Examples
///
/// ```ignore
/// let kept = dedupe_by_url(vec![
///     Article::new("a", "https://prtimes.jp/x/1?utm_source=rss"),
///     Article::new("b", "https://prtimes.jp/x/1/"),
/// ]);
/// assert_eq!(kept.len(), 1);
/// ```
pub fn dedupe_by_url(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| {
            let key = normalize_url(&a.link);
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

/// Collapse near-identical titles, keeping the higher priority source.
pub fn dedupe_by_title(articles: Vec<Article>) -> Vec<Article> {
    let mut accepted: Vec<(Article, String)> = Vec::with_capacity(articles.len());

    for article in articles {
        let normalized = normalize_title(&article.title);
        let duplicate = accepted.iter().position(|(_, existing)| {
            normalized_similarity(&normalized, existing) >= DUPLICATE_THRESHOLD
        });

        match duplicate {
            None => accepted.push((article, normalized)),
            Some(index) => {
                let incumbent = &accepted[index].0;
                if priority(&article) < priority(incumbent) {
                    debug!(
                        kept = %article.link,
                        dropped = %incumbent.link,
                        "Duplicate title; replacing with higher priority source"
                    );
                    accepted.remove(index);
                    accepted.push((article, normalized));
                } else {
                    debug!(
                        kept = %incumbent.link,
                        dropped = %article.link,
                        "Duplicate title; keeping earlier article"
                    );
                }
            }
        }
    }

    accepted.into_iter().map(|(article, _)| article).collect()
}

fn priority(article: &Article) -> u8 {
    SourceKind::from_link(&article.link).priority()
}

/// URL pass followed by the title pass.
pub fn deduplicate(articles: Vec<Article>) -> Vec<Article> {
    let before = articles.len();
    let by_url = dedupe_by_url(articles);
    let after_url = by_url.len();
    let unique = dedupe_by_title(by_url);
    info!(
        before,
        after_url,
        after_title = unique.len(),
        "Removed duplicate articles"
    );
    unique
}
