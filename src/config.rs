// src/config.rs
//! Service configuration, read once at startup from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::ingest::config::{load_keys_from, parse_key_list};
use crate::ingest::SourceKind;
use crate::retry::RetryPolicy;

pub const ENV_SOURCE: &str = "FEED_SOURCE";
pub const ENV_HOST: &str = "RABBITMQ_HOST";
pub const ENV_PORT: &str = "RABBITMQ_PORT";
pub const ENV_USER: &str = "RABBITMQ_USER";
pub const ENV_PASS: &str = "RABBITMQ_PASS";
pub const ENV_VHOST: &str = "RABBITMQ_VHOST";
pub const ENV_GNEWS_API_KEY: &str = "GNEWS_API_KEY";
pub const ENV_CHECK_INTERVAL: &str = "CHECK_INTERVAL";
pub const ENV_QUERY_KEYS: &str = "QUERY_KEYS";
pub const ENV_QUERY_KEYS_PATH: &str = "QUERY_KEYS_PATH";
pub const ENV_DRY_RUN: &str = "FEED_DRY_RUN";
pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;
pub const ERROR_COOLDOWN: Duration = Duration::from_secs(30);
pub const CONNECT_ATTEMPTS: u32 = 5;
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("{var} resolved to an empty key list")]
    EmptyKeys { var: &'static str },
    #[error("loading query keys: {0:#}")]
    Keys(#[source] anyhow::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub heartbeat_secs: u16,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "rabbitmq".into(),
            port: 5672,
            user: "admin".into(),
            password: "admin".into(),
            vhost: "/".into(),
            heartbeat_secs: 600,
        }
    }
}

/// Sleeps and retry budgets used by the driver and the connection manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineTiming {
    pub key_delay: Duration,
    pub check_interval: Duration,
    pub error_cooldown: Duration,
    pub connect_retry: RetryPolicy,
}

impl PipelineTiming {
    pub fn for_source(source: SourceKind, check_interval: Duration) -> Self {
        Self {
            key_delay: source.key_delay(),
            check_interval,
            error_cooldown: ERROR_COOLDOWN,
            connect_retry: RetryPolicy::fixed(CONNECT_ATTEMPTS, CONNECT_RETRY_DELAY),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub source: SourceKind,
    pub broker: BrokerSettings,
    /// Empty → keyless RSS search.
    pub gnews_api_key: Option<String>,
    pub check_interval: Duration,
    pub query_keys: Vec<String>,
    pub dry_run: bool,
    pub metrics_addr: Option<SocketAddr>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string());

        let source = match get(ENV_SOURCE).filter(|v| !v.is_empty()) {
            Some(v) => v.parse::<SourceKind>().map_err(|reason| ConfigError::Invalid {
                var: ENV_SOURCE,
                reason,
            })?,
            None => SourceKind::News,
        };

        let defaults = BrokerSettings::default();
        let port = match get(ENV_PORT).filter(|v| !v.is_empty()) {
            Some(v) => v.parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: ENV_PORT,
                reason: e.to_string(),
            })?,
            None => defaults.port,
        };
        let broker = BrokerSettings {
            host: get(ENV_HOST).filter(|v| !v.is_empty()).unwrap_or(defaults.host),
            port,
            user: get(ENV_USER).filter(|v| !v.is_empty()).unwrap_or(defaults.user),
            password: lookup(ENV_PASS).unwrap_or(defaults.password),
            vhost: get(ENV_VHOST).filter(|v| !v.is_empty()).unwrap_or(defaults.vhost),
            heartbeat_secs: defaults.heartbeat_secs,
        };

        let interval_secs = match get(ENV_CHECK_INTERVAL).filter(|v| !v.is_empty()) {
            Some(v) => v.parse::<u64>().map_err(|e| ConfigError::Invalid {
                var: ENV_CHECK_INTERVAL,
                reason: e.to_string(),
            })?,
            None => DEFAULT_CHECK_INTERVAL_SECS,
        };

        let query_keys = resolve_keys(source, get(ENV_QUERY_KEYS), get(ENV_QUERY_KEYS_PATH))?;

        let metrics_addr = match get(ENV_METRICS_ADDR).filter(|v| !v.is_empty()) {
            Some(v) => Some(v.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                var: ENV_METRICS_ADDR,
                reason: e.to_string(),
            })?),
            None => None,
        };

        Ok(Self {
            source,
            broker,
            gnews_api_key: get(ENV_GNEWS_API_KEY).filter(|v| !v.is_empty()),
            check_interval: Duration::from_secs(interval_secs),
            query_keys,
            dry_run: get(ENV_DRY_RUN).is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
            metrics_addr,
        })
    }

    pub fn timing(&self) -> PipelineTiming {
        PipelineTiming::for_source(self.source, self.check_interval)
    }
}

/// Precedence: $QUERY_KEYS_PATH, then $QUERY_KEYS, then compiled-in defaults.
fn resolve_keys(
    source: SourceKind,
    inline: Option<String>,
    path: Option<String>,
) -> Result<Vec<String>, ConfigError> {
    if let Some(p) = path.filter(|p| !p.is_empty()) {
        let keys = load_keys_from(&PathBuf::from(p)).map_err(ConfigError::Keys)?;
        if keys.is_empty() {
            return Err(ConfigError::EmptyKeys {
                var: ENV_QUERY_KEYS_PATH,
            });
        }
        return Ok(keys);
    }
    if let Some(list) = inline {
        let keys = parse_key_list(&list);
        if keys.is_empty() {
            return Err(ConfigError::EmptyKeys { var: ENV_QUERY_KEYS });
        }
        return Ok(keys);
    }
    Ok(source.default_keys())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| m.get(k).cloned()
    }

    #[test]
    fn defaults_match_news_service() {
        let s = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s.source, SourceKind::News);
        assert_eq!(s.broker, BrokerSettings::default());
        assert_eq!(s.check_interval, Duration::from_secs(300));
        assert_eq!(s.query_keys.len(), 12);
        assert!(s.gnews_api_key.is_none());
        assert!(!s.dry_run);
        assert!(s.metrics_addr.is_none());
    }

    #[test]
    fn fundamentals_timing_and_keys() {
        let s = Settings::from_lookup(lookup(&[
            (ENV_SOURCE, "fundamentals"),
            (ENV_CHECK_INTERVAL, "60"),
        ]))
        .unwrap();
        assert_eq!(s.query_keys[0], "PETR4");
        let t = s.timing();
        assert_eq!(t.key_delay, Duration::from_secs(3));
        assert_eq!(t.check_interval, Duration::from_secs(60));
        assert_eq!(t.error_cooldown, Duration::from_secs(30));
        assert_eq!(t.connect_retry.max_attempts, 5);
        assert_eq!(t.connect_retry.delay, Duration::from_secs(5));
    }

    #[test]
    fn inline_keys_override_defaults() {
        let s = Settings::from_lookup(lookup(&[(ENV_QUERY_KEYS, "bitcoin, ethereum")])).unwrap();
        assert_eq!(s.query_keys, vec!["bitcoin".to_string(), "ethereum".into()]);
    }

    #[test]
    fn bad_values_are_reported() {
        assert!(matches!(
            Settings::from_lookup(lookup(&[(ENV_CHECK_INTERVAL, "soon")])),
            Err(ConfigError::Invalid { var: ENV_CHECK_INTERVAL, .. })
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[(ENV_QUERY_KEYS, " , ")])),
            Err(ConfigError::EmptyKeys { .. })
        ));
        assert!(Settings::from_lookup(lookup(&[(ENV_SOURCE, "weather")])).is_err());
    }
}
