// src/ingest/providers/news.rs
//! News search by topic: Google News RSS (keyless) or the GNews API (keyed).
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use serde_json::json;

use super::{HttpSession, DESKTOP_USER_AGENT};
use crate::ingest::types::{Fetcher, RawRecord};

pub const GOOGLE_NEWS_RSS_URL: &str = "https://news.google.com/rss/search";
pub const GNEWS_API_URL: &str = "https://gnews.io/api/v4/search";
pub const MAX_RESULTS: usize = 10;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<ItemSource>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "$text")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    articles: Vec<ApiArticle>,
}

#[derive(Debug, Deserialize)]
struct ApiArticle {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    source: Option<ApiSource>,
}

#[derive(Debug, Deserialize)]
struct ApiSource {
    name: Option<String>,
    url: Option<String>,
}

enum Mode {
    Fixture(String),
    Rss {
        session: HttpSession,
        url: String,
    },
    Api {
        session: HttpSession,
        url: String,
        api_key: String,
    },
}

pub struct NewsFetcher {
    mode: Mode,
    language: String,
    max_results: usize,
}

impl NewsFetcher {
    /// Keyed GNews API when `api_key` is present, Google News RSS otherwise.
    pub fn from_settings(api_key: Option<&str>) -> Result<Self> {
        match api_key {
            Some(k) => Self::api(GNEWS_API_URL, k),
            None => Self::rss(GOOGLE_NEWS_RSS_URL),
        }
    }

    pub fn rss(url: &str) -> Result<Self> {
        Ok(Self::with_mode(Mode::Rss {
            session: HttpSession::new("news", DESKTOP_USER_AGENT)?,
            url: url.to_string(),
        }))
    }

    pub fn api(url: &str, api_key: &str) -> Result<Self> {
        Ok(Self::with_mode(Mode::Api {
            session: HttpSession::new("news", DESKTOP_USER_AGENT)?,
            url: url.to_string(),
            api_key: api_key.to_string(),
        }))
    }

    /// Serve the same RSS document for every topic.
    pub fn from_fixture(xml: &str) -> Self {
        Self::with_mode(Mode::Fixture(xml.to_string()))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            language: "en".to_string(),
            max_results: MAX_RESULTS,
        }
    }

    pub fn with_max_results(mut self, n: usize) -> Self {
        self.max_results = n.max(1);
        self
    }

    fn parse_rss(&self, s: &str) -> Result<Vec<RawRecord>> {
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing news rss xml")?;

        Ok(rss
            .channel
            .item
            .into_iter()
            .take(self.max_results)
            .map(|it| {
                let (publisher, href) = match it.source {
                    Some(src) => (src.name, src.url),
                    None => (None, None),
                };
                article_record(
                    it.title,
                    it.description,
                    it.link,
                    it.pub_date,
                    publisher,
                    href,
                )
            })
            .collect())
    }

    fn map_api(&self, resp: ApiResponse) -> Vec<RawRecord> {
        resp.articles
            .into_iter()
            .take(self.max_results)
            .map(|a| {
                let (publisher, href) = match a.source {
                    Some(src) => (src.name, src.url),
                    None => (None, None),
                };
                article_record(a.title, a.description, a.url, a.published_at, publisher, href)
            })
            .collect()
    }
}

/// Raw article shape shared by both modes.
fn article_record(
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published: Option<String>,
    publisher: Option<String>,
    href: Option<String>,
) -> RawRecord {
    RawRecord::from(json!({
        "title": title.unwrap_or_default(),
        "description": description.unwrap_or_default(),
        "url": url.unwrap_or_default(),
        "published date": published,
        "publisher": { "title": publisher, "href": href },
    }))
}

#[async_trait]
impl Fetcher for NewsFetcher {
    async fn fetch(&self, key: &str) -> Result<Vec<RawRecord>> {
        tracing::info!(target: "ingest", topic = key, "fetching news");
        match &self.mode {
            Mode::Fixture(s) => self.parse_rss(s),

            Mode::Rss { session, url } => {
                let resp = session
                    .client()?
                    .get(url)
                    .query(&[
                        ("q", key),
                        ("hl", "en-US"),
                        ("gl", "US"),
                        ("ceid", "US:en"),
                    ])
                    .send()
                    .await
                    .with_context(|| format!("news rss get() for {key}"))?;
                if !resp.status().is_success() {
                    bail!("news rss returned {} for {key}", resp.status());
                }
                let body = resp.text().await.context("news rss .text()")?;
                self.parse_rss(&body)
            }

            Mode::Api {
                session,
                url,
                api_key,
            } => {
                let max = self.max_results.to_string();
                let resp = session
                    .client()?
                    .get(url)
                    .query(&[
                        ("q", key),
                        ("lang", self.language.as_str()),
                        ("max", max.as_str()),
                        ("apikey", api_key.as_str()),
                    ])
                    .send()
                    .await
                    .with_context(|| format!("news api get() for {key}"))?;
                if !resp.status().is_success() {
                    bail!("news api returned {} for {key}", resp.status());
                }
                let parsed: ApiResponse = resp.json().await.context("news api json")?;
                Ok(self.map_api(parsed))
            }
        }
    }

    fn name(&self) -> &'static str {
        match self.mode {
            Mode::Fixture(_) => "news-fixture",
            Mode::Rss { .. } => "google-news-rss",
            Mode::Api { .. } => "gnews-api",
        }
    }

    async fn close(&self) {
        match &self.mode {
            Mode::Rss { session, .. } | Mode::Api { session, .. } => session.close(),
            Mode::Fixture(_) => {}
        }
    }
}

/// XML has no named entities beyond the basic five; feeds still send these.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_articles_map_to_raw_shape() {
        let f = NewsFetcher::from_fixture("<rss/>");
        let resp: ApiResponse = serde_json::from_str(
            r#"{"totalArticles":1,"articles":[{"title":"T","description":"D","url":"https://x/9",
                "publishedAt":"2025-09-06T08:30:00Z","source":{"name":"CNBC","url":"https://cnbc.com"}}]}"#,
        )
        .unwrap();
        let out = f.map_api(resp);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].str_at("url"), Some("https://x/9"));
        assert_eq!(out[0].str_at("publisher.title"), Some("CNBC"));
        assert_eq!(out[0].str_at("published date"), Some("2025-09-06T08:30:00Z"));
    }

    #[tokio::test]
    async fn empty_channel_yields_no_records() {
        let f = NewsFetcher::from_fixture("<rss><channel><title>x</title></channel></rss>");
        assert!(f.fetch("bitcoin").await.unwrap().is_empty());
    }
}
