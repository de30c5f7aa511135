// src/ingest/source.rs
//! Per-source constants and RawRecord → PublishableRecord normalization.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::broker::Topology;
use crate::ingest::normalize_text;
use crate::ingest::types::{FundamentalSnapshot, NewsArticle, PublishableRecord, RawRecord};

pub const MARKET_TOPICS: &[&str] = &[
    "stock market",
    "nasdaq",
    "dow jones",
    "S&P 500",
    "cryptocurrency",
    "bitcoin",
    "ethereum",
    "federal reserve",
    "interest rates",
    "inflation",
    "market crash",
    "market rally",
];

pub const BRAZILIAN_STOCKS: &[&str] = &[
    "PETR4", "VALE3", "ITUB4", "BBDC4", "ABEV3", "B3SA3", "WEGE3", "RENT3", "MGLU3", "SUZB3",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    News,
    Fundamentals,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::News => "news",
            SourceKind::Fundamentals => "fundamentals",
        }
    }

    pub fn topology(self) -> Topology {
        match self {
            SourceKind::News => Topology::NEWS,
            SourceKind::Fundamentals => Topology::FUNDAMENTALS,
        }
    }

    /// Pause after each key, to stay under the source's rate limits.
    pub fn key_delay(self) -> Duration {
        match self {
            SourceKind::News => Duration::from_secs(2),
            SourceKind::Fundamentals => Duration::from_secs(3),
        }
    }

    pub fn default_keys(self) -> Vec<String> {
        let keys = match self {
            SourceKind::News => MARKET_TOPICS,
            SourceKind::Fundamentals => BRAZILIAN_STOCKS,
        };
        keys.iter().map(|s| s.to_string()).collect()
    }

    /// Normalize one raw record fetched for `key`.
    ///
    /// Returns `None` when the record has no identity (URL / symbol); such
    /// records never reach the deduplicator.
    pub fn normalize(
        self,
        raw: &RawRecord,
        key: &str,
        fetched_at: DateTime<Utc>,
    ) -> Option<PublishableRecord> {
        match self {
            SourceKind::News => normalize_news(raw, key, fetched_at).map(PublishableRecord::News),
            SourceKind::Fundamentals => {
                normalize_fundamentals(raw, key, fetched_at).map(PublishableRecord::Fundamentals)
            }
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "news" | "gnews" => Ok(SourceKind::News),
            "fundamentals" | "fundamental" | "scraping" => Ok(SourceKind::Fundamentals),
            other => Err(format!("unknown feed source `{other}`")),
        }
    }
}

fn normalize_news(raw: &RawRecord, topic: &str, fetched_at: DateTime<Utc>) -> Option<NewsArticle> {
    let url = raw.str_at("url")?.to_string();
    let text = |k: &str| raw.str_at(k).map(normalize_text).unwrap_or_default();

    let source = raw
        .str_at("publisher.title")
        .or_else(|| raw.str_at("source"))
        .map(normalize_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let source_time = raw
        .str_at("published date")
        .or_else(|| raw.str_at("publishedAt"))
        .and_then(parse_source_time)
        .unwrap_or(fetched_at);

    Some(NewsArticle {
        title: text("title"),
        description: text("description"),
        url,
        source,
        source_time,
        topic: topic.to_string(),
        fetched_at,
    })
}

fn normalize_fundamentals(
    raw: &RawRecord,
    query: &str,
    fetched_at: DateTime<Utc>,
) -> Option<FundamentalSnapshot> {
    let symbol = raw.str_at("symbol")?.to_ascii_uppercase();
    let ind = |k: &str| raw.get(k).and_then(parse_indicator);

    let source_time = raw
        .str_at("reported_at")
        .and_then(parse_source_time)
        .unwrap_or(fetched_at);

    Some(FundamentalSnapshot {
        symbol,
        dividend_yield: ind("dividend_yield"),
        p_vp: ind("p_vp"),
        p_l: ind("p_l"),
        roe: ind("roe"),
        liquidity: ind("liquidity"),
        query: query.to_string(),
        source_time,
        fetched_at,
    })
}

/// RFC 3339 first, then RFC 2822 (RSS `pubDate`).
pub fn parse_source_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Accepts JSON numbers and strings such as `"5,5%"`, `"1.234,56"` or `"15.2"`.
pub fn parse_indicator(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number_text(s),
        _ => None,
    }
}

fn parse_number_text(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, '%' | ' ' | '\u{a0}'))
        .collect();
    if cleaned.is_empty() || cleaned == "-" || cleaned == "--" {
        return None;
    }
    // Brazilian notation uses '.' for thousands and ',' for decimals.
    let canonical = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };
    canonical.parse::<f64>().ok().filter(|x| x.is_finite())
}
