// src/service.rs
//! Builds one pipeline from `Settings` and runs it until interrupted.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::broker::amqp::AmqpConnector;
use crate::broker::memory::MemoryBroker;
use crate::broker::{BrokerConnector, ConnectionManager, Publisher};
use crate::config::Settings;
use crate::ingest::providers::{news::NewsFetcher, status_invest::StatusInvestFetcher};
use crate::ingest::{Driver, Fetcher, SourceKind};

pub fn build_fetcher(settings: &Settings) -> Result<Box<dyn Fetcher>> {
    Ok(match settings.source {
        SourceKind::News => Box::new(NewsFetcher::from_settings(
            settings.gnews_api_key.as_deref(),
        )?),
        SourceKind::Fundamentals => Box::new(StatusInvestFetcher::new()?),
    })
}

pub fn build_connector(settings: &Settings) -> Box<dyn BrokerConnector> {
    if settings.dry_run {
        warn!(target: "ingest", "dry run: publishing to an in-memory broker");
        Box::new(MemoryBroker::new().connector())
    } else {
        Box::new(AmqpConnector::new(settings.broker.clone()))
    }
}

pub fn build_driver(
    settings: &Settings,
    fetcher: Box<dyn Fetcher>,
    connector: Box<dyn BrokerConnector>,
) -> Driver {
    let timing = settings.timing();
    let conn = ConnectionManager::new(connector, settings.source.topology(), timing.connect_retry);
    Driver::new(
        settings.source,
        settings.query_keys.clone(),
        fetcher,
        Publisher::new(conn),
        timing,
    )
}

/// Connect, run until `shutdown` fires, then release broker and HTTP session.
///
/// Resources are released on every exit path, including a failed start. An
/// interrupt during the startup connect is a graceful shutdown, not a failure.
pub async fn run_pipeline(mut driver: Driver, shutdown: CancellationToken) -> Result<()> {
    let started = tokio::select! {
        res = driver.start() => Some(res),
        _ = shutdown.cancelled() => None,
    };
    let res = match started {
        Some(Ok(())) => {
            driver.run(shutdown).await;
            Ok(())
        }
        Some(Err(e)) => Err(anyhow::Error::new(e).context("broker unavailable at startup")),
        None => {
            info!(target: "ingest", "shutdown requested while connecting to broker");
            Ok(())
        }
    };
    driver.close().await;
    res
}

/// Cancel the token on Ctrl-C or SIGTERM.
pub fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        token.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Full service entrypoint used by the binary.
pub async fn run(settings: Settings) -> Result<()> {
    if let Some(addr) = settings.metrics_addr {
        crate::telemetry::install_prometheus(addr)?;
    }

    let fetcher = build_fetcher(&settings)?;
    let connector = build_connector(&settings);
    let driver = build_driver(&settings, fetcher, connector);

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());
    run_pipeline(driver, shutdown).await
}
