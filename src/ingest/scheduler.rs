// src/ingest/scheduler.rs
//! The outer control loop: fetch → normalize → dedup → publish, key by key,
//! then sleep and start over until shut down.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use metrics::{counter, gauge, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::{BrokerError, PublishOutcome, Publisher};
use crate::config::PipelineTiming;
use crate::dedup::Deduplicator;
use crate::ingest::source::SourceKind;
use crate::ingest::types::Fetcher;
use crate::telemetry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Starting,
    Connecting,
    Running,
    Cycling,
    Stopped,
}

/// Counts for one pass over all keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub keys: usize,
    pub fetched: usize,
    pub published: usize,
    pub duplicates: usize,
    pub missing_identity: usize,
    pub fetch_errors: usize,
    pub publish_failures: usize,
    /// The cycle stopped early because the broker could not be reconnected.
    pub broker_down: bool,
}

pub struct Driver {
    source: SourceKind,
    keys: Vec<String>,
    fetcher: Box<dyn Fetcher>,
    dedup: Deduplicator,
    publisher: Publisher,
    timing: PipelineTiming,
    state: DriverState,
}

impl Driver {
    pub fn new(
        source: SourceKind,
        keys: Vec<String>,
        fetcher: Box<dyn Fetcher>,
        publisher: Publisher,
        timing: PipelineTiming,
    ) -> Self {
        telemetry::ensure_metrics_described();
        Self {
            source,
            keys,
            fetcher,
            dedup: Deduplicator::default(),
            publisher,
            timing,
            state: DriverState::Starting,
        }
    }

    pub fn with_dedup(mut self, dedup: Deduplicator) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    /// Connect to the broker. An error here is fatal: the loop never starts
    /// on a half-initialized pipeline.
    pub async fn start(&mut self) -> Result<(), BrokerError> {
        self.state = DriverState::Connecting;
        let topology = *self.publisher.topology();
        info!(
            target: "ingest",
            source = %self.source,
            fetcher = self.fetcher.name(),
            exchange = topology.exchange,
            queue = topology.queue,
            "{} service starting",
            self.source
        );
        info!(target: "ingest", "monitoring {}: {}", self.keys.len(), self.keys.join(", "));
        info!(
            target: "ingest",
            "check interval: {} seconds",
            self.timing.check_interval.as_secs()
        );

        match self.publisher.connect().await {
            Ok(()) => {
                self.state = DriverState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = DriverState::Stopped;
                Err(e)
            }
        }
    }

    /// Run cycles until `shutdown` is cancelled.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        if self.state == DriverState::Starting {
            warn!(target: "ingest", "driver run without start; connecting lazily on first publish");
            self.state = DriverState::Running;
        }

        while !shutdown.is_cancelled() {
            self.state = DriverState::Cycling;
            let outcome = tokio::select! {
                res = AssertUnwindSafe(self.run_cycle(&shutdown)).catch_unwind() => Some(res),
                _ = shutdown.cancelled() => None,
            };
            self.state = DriverState::Running;

            let pause = match outcome {
                None => break,
                Some(Ok(report)) if report.broker_down => {
                    counter!("feed_cycle_failures_total", "source" => self.source.as_str())
                        .increment(1);
                    error!(
                        target: "ingest",
                        source = %self.source,
                        published = report.published,
                        "broker unavailable, cooling down for {} seconds",
                        self.timing.error_cooldown.as_secs()
                    );
                    self.timing.error_cooldown
                }
                Some(Ok(report)) => {
                    info!(
                        target: "ingest",
                        source = %self.source,
                        published = report.published,
                        duplicates = report.duplicates,
                        fetch_errors = report.fetch_errors,
                        "completed {} check cycle, sleeping for {} seconds",
                        self.source,
                        self.timing.check_interval.as_secs()
                    );
                    self.timing.check_interval
                }
                Some(Err(panic)) => {
                    counter!("feed_cycle_failures_total", "source" => self.source.as_str())
                        .increment(1);
                    error!(
                        target: "ingest",
                        source = %self.source,
                        error = %panic_message(panic.as_ref()),
                        "error in main loop, cooling down for {} seconds",
                        self.timing.error_cooldown.as_secs()
                    );
                    self.timing.error_cooldown
                }
            };

            if !sleep_or_cancel(pause, &shutdown).await {
                break;
            }
        }

        self.state = DriverState::Stopped;
        info!(target: "ingest", source = %self.source, "shutting down {} service", self.source);
    }

    /// One pass over every configured key, in order.
    pub async fn run_cycle(&mut self, shutdown: &CancellationToken) -> CycleReport {
        let t0 = Instant::now();
        let mut report = CycleReport::default();
        let keys = self.keys.clone();

        for key in &keys {
            if shutdown.is_cancelled() {
                break;
            }
            report.keys += 1;
            self.process_key(key, &mut report).await;
            if report.broker_down {
                break;
            }

            if !sleep_or_cancel(self.timing.key_delay, shutdown).await {
                break;
            }
        }

        let src = self.source.as_str();
        histogram!("feed_cycle_duration_ms", "source" => src)
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        gauge!("feed_last_cycle_ts", "source" => src)
            .set(chrono::Utc::now().timestamp().max(0) as f64);
        report
    }

    async fn process_key(&mut self, key: &str, report: &mut CycleReport) {
        let src = self.source.as_str();
        debug!(target: "ingest", source = src, key, "fetching");

        let records = match self.fetcher.fetch(key).await {
            Ok(v) => v,
            Err(e) => {
                report.fetch_errors += 1;
                counter!("feed_fetch_errors_total", "source" => src).increment(1);
                warn!(
                    target: "ingest",
                    source = src,
                    key,
                    error = %format!("{e:#}"),
                    "fetch failed, skipping key"
                );
                return;
            }
        };
        if records.is_empty() {
            debug!(target: "ingest", source = src, key, "no records");
            return;
        }
        report.fetched += records.len();
        counter!("feed_records_fetched_total", "source" => src).increment(records.len() as u64);

        let fetched_at = chrono::Utc::now();
        for raw in &records {
            let Some(record) = self.source.normalize(raw, key, fetched_at) else {
                report.missing_identity += 1;
                counter!("feed_missing_identity_total", "source" => src).increment(1);
                continue;
            };

            let identity = record.identity();
            if self.dedup.seen(identity) {
                report.duplicates += 1;
                counter!("feed_duplicates_total", "source" => src).increment(1);
                continue;
            }

            match self.publisher.publish(&record).await {
                PublishOutcome::Published => report.published += 1,
                PublishOutcome::Dropped => report.publish_failures += 1,
                PublishOutcome::BrokerDown => {
                    report.publish_failures += 1;
                    report.broker_down = true;
                    break;
                }
            }
            // Dropped records are marked too; they are not replayed.
            self.dedup.mark(identity);
        }
        gauge!("feed_dedup_cache_size", "source" => src).set(self.dedup.len() as f64);
    }

    /// Release the broker connection and the fetcher's session.
    pub async fn close(&mut self) {
        self.publisher.close().await;
        self.fetcher.close().await;
        self.state = DriverState::Stopped;
    }
}

/// `false` when cancelled before the full duration elapsed.
async fn sleep_or_cancel(d: Duration, shutdown: &CancellationToken) -> bool {
    if d.is_zero() {
        return !shutdown.is_cancelled();
    }
    tokio::select! {
        _ = tokio::time::sleep(d) => true,
        _ = shutdown.cancelled() => false,
    }
}

fn panic_message(p: &(dyn Any + Send)) -> String {
    if let Some(s) = p.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = p.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
