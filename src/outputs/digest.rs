//! Render the selected articles as one chat message.
//!
//! ```text
//! 🩺🤖 医療×ITニュースまとめ（2024-01-15 09:00 JST）
//!
//! 【PR TIMES】
//! 1. 医療AIシステム導入
//!    https://prtimes.jp/x/1
//!    公開: Mon, 15 Jan 2024 08:00:00 +0900
//!    キーワード: 医療, AI, システム
//!    病院向けに…
//!
//! 【ヘルステックウォッチ】
//! 2. ...
//!
//! 合計 2 件
//! ```
//!
//! Groups follow [`SourceKind::ALL`]; numbering runs across groups.

use crate::models::{Article, SourceKind};
use crate::scrapers::jst;
use chrono::{DateTime, FixedOffset};
use itertools::Itertools;
use std::fmt::Write;

pub const EMPTY_MESSAGE: &str = "🩺🤖 本時間帯の医療×IT 新着はありませんでした。";

/// Longest summary shown, in characters.
pub const SUMMARY_MAX_CHARS: usize = 150;

/// A sentence boundary only counts past this many characters.
const SUMMARY_MIN_CUT: usize = 100;

const SENTENCE_ENDS: &[char] = &['。', '．', '！', '？', '.', '!', '?', '\n'];

pub fn build_message(articles: &[Article], now: DateTime<FixedOffset>) -> String {
    if articles.is_empty() {
        return EMPTY_MESSAGE.to_string();
    }

    let mut out = String::new();
    let stamp = now.with_timezone(&jst()).format("%Y-%m-%d %H:%M JST");
    let _ = writeln!(out, "🩺🤖 医療×ITニュースまとめ（{stamp}）");

    let groups = articles.iter().into_group_map_by(|a| a.source_kind());
    let mut number = 0;
    for kind in SourceKind::ALL {
        let Some(group) = groups.get(&kind) else {
            continue;
        };
        let _ = writeln!(out, "\n【{}】", kind.display_name());
        for article in group {
            number += 1;
            write_entry(&mut out, number, article);
        }
    }

    let _ = write!(out, "\n合計 {} 件", articles.len());
    out
}

fn write_entry(out: &mut String, number: usize, article: &Article) {
    let _ = writeln!(out, "{number}. {}", article.title);
    let _ = writeln!(out, "   {}", article.link);
    if let Some(published) = article.published.as_deref().filter(|p| !p.trim().is_empty()) {
        let _ = writeln!(out, "   公開: {}", published.trim());
    }
    if !article.matched_keywords.is_empty() {
        let _ = writeln!(out, "   キーワード: {}", article.matched_keywords.join(", "));
    }
    if let Some(summary) = article.summary.as_deref() {
        let summary = truncate_summary(summary);
        if !summary.is_empty() {
            let _ = writeln!(out, "   {}", summary.replace('\n', " "));
        }
    }
}

/// Shorten a summary to at most [`SUMMARY_MAX_CHARS`] characters.
///
/// Cuts after the last sentence end found past the 100th character, or
/// hard-cuts with an ellipsis when there is none.
pub fn truncate_summary(summary: &str) -> String {
    let summary = summary.trim();
    let chars: Vec<char> = summary.chars().collect();
    if chars.len() <= SUMMARY_MAX_CHARS {
        return summary.to_string();
    }

    let window = &chars[..SUMMARY_MAX_CHARS];
    let cut = window
        .iter()
        .rposition(|c| SENTENCE_ENDS.contains(c))
        .filter(|&i| i >= SUMMARY_MIN_CUT);

    match cut {
        Some(i) => window[..=i].iter().collect::<String>().trim_end().to_string(),
        None => {
            let mut head: String = window[..SUMMARY_MAX_CHARS - 1].iter().collect();
            head.push('…');
            head
        }
    }
}
