//! market-feed binary entrypoint.
//! Runs one pipeline (news or fundamentals, per `FEED_SOURCE`) until SIGINT/SIGTERM.
//!
//! Exit status: 0 after a graceful shutdown, 1 when configuration is invalid
//! or the broker cannot be reached at startup.

use market_feed::{service, telemetry, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    telemetry::init_tracing();

    let settings = Settings::from_env()?;
    service::run(settings).await
}
