// src/ingest/providers/mod.rs
pub mod news;
pub mod status_invest;

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Browser-like UA; some sources reject the default reqwest agent.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared HTTP client for one fetcher, released explicitly on shutdown.
pub struct HttpSession {
    name: &'static str,
    client: Mutex<Option<reqwest::Client>>,
}

impl HttpSession {
    pub fn new(name: &'static str, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(HTTP_TIMEOUT)
            .build()
            .with_context(|| format!("{name}: building http client"))?;
        Ok(Self {
            name,
            client: Mutex::new(Some(client)),
        })
    }

    /// Cheap clone of the pooled client; errors once the session is closed.
    pub fn client(&self) -> Result<reqwest::Client> {
        self.client
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| anyhow!("{}: http session closed", self.name))
    }

    pub fn close(&self) {
        let taken = self.client.lock().unwrap_or_else(|e| e.into_inner()).take();
        if taken.is_some() {
            tracing::info!(target: "ingest", fetcher = self.name, "HTTP session closed");
        }
    }
}
