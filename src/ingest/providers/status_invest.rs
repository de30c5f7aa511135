// src/ingest/providers/status_invest.rs
//! Fundamentals for Brazilian tickers, scraped from StatusInvest pages.
//!
//! Extraction is best-effort: each indicator is looked up by its card label
//! and the first `<strong class="value">` that follows it. Indicators that
//! cannot be located are reported as `null`.
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::Value;

use super::{HttpSession, DESKTOP_USER_AGENT};
use crate::ingest::types::{Fetcher, RawRecord};

pub const BASE_URL: &str = "https://statusinvest.com.br/acoes";

/// (record field, card labels in page order of preference)
const INDICATORS: &[(&str, &[&str])] = &[
    ("dividend_yield", &["Dividend Yield", "D.Y"]),
    ("p_vp", &["P/VP"]),
    ("p_l", &["P/L"]),
    ("roe", &["ROE"]),
    ("liquidity", &["Liquidez média diária", "Liquidez media diaria"]),
];

static PATTERNS: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| {
    INDICATORS
        .iter()
        .map(|(field, labels)| {
            let res = labels
                .iter()
                .filter_map(|label| {
                    Regex::new(&format!(
                        r#"(?is)>\s*{}\s*<.{{0,600}}?<strong[^>]*class="[^"]*\bvalue\b[^"]*"[^>]*>\s*([^<]*?)\s*</strong>"#,
                        regex::escape(label)
                    ))
                    .ok()
                })
                .collect();
            (*field, res)
        })
        .collect()
});

/// Pull indicator strings out of a StatusInvest page.
///
/// Returns `None` if no indicator at all was found (unknown ticker page,
/// layout change, bot wall).
pub fn extract_indicators(symbol: &str, html: &str) -> Option<RawRecord> {
    let mut rec = RawRecord::new().with("symbol", symbol.to_ascii_uppercase());
    let mut found = 0usize;

    for (field, res) in PATTERNS.iter() {
        let value = res
            .iter()
            .find_map(|re| re.captures(html))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty());
        match value {
            Some(v) => {
                found += 1;
                rec = rec.with(field, v);
            }
            None => {
                tracing::debug!(target: "ingest", symbol, indicator = *field, "indicator not found");
                rec = rec.with(field, Value::Null);
            }
        }
    }

    (found > 0).then_some(rec)
}

enum Mode {
    Fixture(String),
    Http { session: HttpSession, base_url: String },
}

pub struct StatusInvestFetcher {
    mode: Mode,
}

impl StatusInvestFetcher {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            mode: Mode::Http {
                session: HttpSession::new("status-invest", DESKTOP_USER_AGENT)?,
                base_url: base_url.trim_end_matches('/').to_string(),
            },
        })
    }

    /// Serve the same page for every symbol.
    pub fn from_fixture(html: &str) -> Self {
        Self {
            mode: Mode::Fixture(html.to_string()),
        }
    }

    fn page_url(base_url: &str, symbol: &str) -> String {
        format!("{base_url}/{}", symbol.to_lowercase())
    }
}

#[async_trait]
impl Fetcher for StatusInvestFetcher {
    async fn fetch(&self, key: &str) -> Result<Vec<RawRecord>> {
        let html = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http { session, base_url } => {
                let url = Self::page_url(base_url, key);
                tracing::info!(target: "ingest", symbol = key, %url, "scraping fundamentals");
                let resp = session
                    .client()?
                    .get(&url)
                    .send()
                    .await
                    .with_context(|| format!("status invest get() for {key}"))?;
                if resp.status() == StatusCode::NOT_FOUND {
                    tracing::warn!(target: "ingest", symbol = key, "ticker page not found");
                    return Ok(Vec::new());
                }
                if !resp.status().is_success() {
                    bail!("status invest returned {} for {key}", resp.status());
                }
                resp.text().await.context("status invest .text()")?
            }
        };

        match extract_indicators(key, &html) {
            Some(rec) => Ok(vec![rec]),
            None => {
                tracing::warn!(target: "ingest", symbol = key, "no indicators found on page");
                Ok(Vec::new())
            }
        }
    }

    fn name(&self) -> &'static str {
        match self.mode {
            Mode::Fixture(_) => "status-invest-fixture",
            Mode::Http { .. } => "status-invest",
        }
    }

    async fn close(&self) {
        if let Mode::Http { session, .. } = &self.mode {
            session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_lowercases_symbol() {
        assert_eq!(
            StatusInvestFetcher::page_url(BASE_URL, "PETR4"),
            "https://statusinvest.com.br/acoes/petr4"
        );
    }

    #[test]
    fn extracts_value_after_label() {
        let html = r#"<div><h3 class="title m-0">P/VP</h3><span>x</span>
            <strong class="value d-block">1,05</strong></div>"#;
        let rec = extract_indicators("vale3", html).unwrap();
        assert_eq!(rec.str_at("symbol"), Some("VALE3"));
        assert_eq!(rec.str_at("p_vp"), Some("1,05"));
        assert_eq!(rec.get("roe"), Some(&Value::Null));
    }

    #[test]
    fn page_without_indicators_is_no_result() {
        assert!(extract_indicators("XXXX3", "<html><body>404</body></html>").is_none());
    }
}
