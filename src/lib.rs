// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod broker;
pub mod config;
pub mod dedup;
pub mod ingest;
pub mod retry;
pub mod service;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::broker::{BrokerError, PublishOutcome, Publisher, Topology};
pub use crate::config::Settings;
pub use crate::dedup::Deduplicator;
pub use crate::ingest::{Driver, DriverState, Fetcher, PublishableRecord, RawRecord, SourceKind};
