// tests/publisher_reconnect.rs
use std::time::Duration;

use chrono::{TimeZone, Utc};
use market_feed::broker::memory::MemoryBroker;
use market_feed::broker::{ConnectionManager, MessageProperties, PublishOutcome, Publisher, Topology};
use market_feed::ingest::types::NewsArticle;
use market_feed::retry::RetryPolicy;
use market_feed::PublishableRecord;

fn publisher(broker: &MemoryBroker) -> Publisher {
    Publisher::new(ConnectionManager::new(
        Box::new(broker.connector()),
        Topology::NEWS,
        RetryPolicy::fixed(5, Duration::from_secs(5)),
    ))
}

fn article(url: &str) -> PublishableRecord {
    let t = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
    PublishableRecord::News(NewsArticle {
        title: "Dow futures slip".into(),
        description: "".into(),
        url: url.into(),
        source: "Reuters".into(),
        source_time: t,
        topic: "dow jones".into(),
        fetched_at: t,
    })
}

#[tokio::test(start_paused = true)]
async fn write_failure_triggers_exactly_one_reconnect() {
    let broker = MemoryBroker::new();
    let mut p = publisher(&broker);
    p.connect().await.unwrap();
    assert_eq!(broker.open_attempts(), 1);

    broker.fail_next_publishes(1);
    let out = p.publish(&article("https://x/1")).await;

    assert_eq!(out, PublishOutcome::Dropped);
    assert_eq!(broker.open_attempts(), 2);
    assert_eq!(broker.published_count(), 0);

    // the fresh channel is used as-is for the next record
    let out = p.publish(&article("https://x/2")).await;
    assert_eq!(out, PublishOutcome::Published);
    assert_eq!(broker.open_attempts(), 2);
    assert_eq!(broker.published_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_reconnect_reports_broker_down() {
    let broker = MemoryBroker::new();
    let mut p = publisher(&broker);
    p.connect().await.unwrap();

    broker.fail_next_publishes(1);
    broker.fail_next_opens(usize::MAX);
    let t0 = tokio::time::Instant::now();
    let out = p.publish(&article("https://x/1")).await;

    assert_eq!(out, PublishOutcome::BrokerDown);
    assert!(out.is_broker_down());
    // initial open + one full reconnect run of five attempts
    assert_eq!(broker.open_attempts(), 6);
    assert_eq!(t0.elapsed(), Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn unreachable_broker_on_lazy_connect_is_broker_down() {
    let broker = MemoryBroker::new();
    broker.fail_next_opens(usize::MAX);
    let mut p = publisher(&broker);

    let out = p.publish(&article("https://x/1")).await;
    assert_eq!(out, PublishOutcome::BrokerDown);
    assert_eq!(broker.open_attempts(), 5);
    assert_eq!(broker.published_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn publish_connects_lazily_with_persistent_json() {
    let broker = MemoryBroker::new();
    let mut p = publisher(&broker);

    let out = p.publish(&article("https://x/1")).await;
    assert!(out.is_published());
    assert_eq!(broker.open_attempts(), 1);

    let msgs = broker.published();
    assert_eq!(msgs.len(), 1);
    let m = &msgs[0];
    assert_eq!(m.exchange, "market_news");
    assert_eq!(m.routing_key, "");
    assert_eq!(m.properties, MessageProperties::persistent_json());
    assert_eq!(m.properties.content_type, "application/json");
    assert_eq!(m.properties.delivery_mode, 2);

    let body: serde_json::Value = serde_json::from_slice(&m.body).unwrap();
    assert_eq!(body["url"], "https://x/1");
    assert_eq!(body["topic"], "dow jones");
    assert_eq!(body["source"], "Reuters");
    assert_eq!(body["published_at"], "2025-09-06T09:00:00Z");
    assert_eq!(body["fetched_at"], "2025-09-06T09:00:00Z");
}
