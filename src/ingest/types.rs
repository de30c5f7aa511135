// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unstructured key/value record as returned by a fetcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Walk a dotted path (`"publisher.title"`) and return a non-empty string.
    pub fn str_at(&self, path: &str) -> Option<&str> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut cur = self.0.get(first)?;
        for p in parts {
            cur = cur.get(p)?;
        }
        cur.as_str().map(str::trim).filter(|s| !s.is_empty())
    }
}

impl From<Value> for RawRecord {
    fn from(v: Value) -> Self {
        match v {
            Value::Object(m) => RawRecord(m),
            _ => RawRecord::default(),
        }
    }
}

/// External data source. One call per query key.
///
/// Transient conditions should come back as an empty list or an `Err`; the
/// driver logs either and moves on to the next key.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Vec<RawRecord>>;

    fn name(&self) -> &'static str;

    /// Release source-side resources (HTTP session). Called once on shutdown.
    async fn close(&self) {}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsArticle {
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    #[serde(rename = "published_at")]
    pub source_time: DateTime<Utc>,
    pub topic: String,
    pub fetched_at: DateTime<Utc>,
}

/// Indicator values are best-effort; `None` means the source did not expose one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FundamentalSnapshot {
    pub symbol: String,
    pub dividend_yield: Option<f64>,
    pub p_vp: Option<f64>,
    pub p_l: Option<f64>,
    pub roe: Option<f64>,
    pub liquidity: Option<f64>,
    pub query: String,
    #[serde(rename = "reported_at")]
    pub source_time: DateTime<Utc>,
    #[serde(rename = "scraped_at")]
    pub fetched_at: DateTime<Utc>,
}

/// Normalized record; serialized as-is to the message body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PublishableRecord {
    News(NewsArticle),
    Fundamentals(FundamentalSnapshot),
}

impl PublishableRecord {
    /// Dedup key: the article URL or the ticker symbol.
    pub fn identity(&self) -> &str {
        match self {
            PublishableRecord::News(a) => &a.url,
            PublishableRecord::Fundamentals(f) => &f.symbol,
        }
    }

    pub fn query_key(&self) -> &str {
        match self {
            PublishableRecord::News(a) => &a.topic,
            PublishableRecord::Fundamentals(f) => &f.query,
        }
    }

    pub fn source_time(&self) -> DateTime<Utc> {
        match self {
            PublishableRecord::News(a) => a.source_time,
            PublishableRecord::Fundamentals(f) => f.source_time,
        }
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        match self {
            PublishableRecord::News(a) => a.fetched_at,
            PublishableRecord::Fundamentals(f) => f.fetched_at,
        }
    }

    /// Short label for logs.
    pub fn headline(&self) -> &str {
        match self {
            PublishableRecord::News(a) if !a.title.is_empty() => &a.title,
            PublishableRecord::News(_) => "N/A",
            PublishableRecord::Fundamentals(f) => &f.symbol,
        }
    }
}
