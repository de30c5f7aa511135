// src/telemetry.rs
use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "feed_records_fetched_total",
            "Raw records returned by fetchers."
        );
        describe_counter!("feed_published_total", "Records published to the broker.");
        describe_counter!(
            "feed_duplicates_total",
            "Records skipped because their identity was already published."
        );
        describe_counter!(
            "feed_missing_identity_total",
            "Records dropped for lacking an identity (URL / symbol)."
        );
        describe_counter!("feed_fetch_errors_total", "Fetcher errors.");
        describe_counter!(
            "feed_publish_failures_total",
            "Publish attempts that ended with the record dropped."
        );
        describe_counter!("feed_reconnects_total", "Broker reconnects triggered at runtime.");
        describe_counter!(
            "feed_cycle_failures_total",
            "Cycles aborted by an unexpected failure."
        );
        describe_gauge!("feed_dedup_cache_size", "Identities held by the dedup cache.");
        describe_gauge!("feed_last_cycle_ts", "Unix ts when the last cycle finished.");
        describe_histogram!("feed_cycle_duration_ms", "Cycle duration in milliseconds.");
    });
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("installing prometheus exporter on {addr}"))?;
    ensure_metrics_described();
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}

/// Compact logs by default; `LOG_FORMAT=json` for structured output.
/// Filter comes from `RUST_LOG`, falling back to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialized: {e}");
    }
}
