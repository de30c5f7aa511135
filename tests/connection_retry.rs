// tests/connection_retry.rs
use std::time::Duration;

use market_feed::broker::memory::MemoryBroker;
use market_feed::broker::{BrokerError, ConnectionManager, Topology};
use market_feed::retry::RetryPolicy;
use tokio::time::Instant;

fn manager(broker: &MemoryBroker, topology: Topology) -> ConnectionManager {
    ConnectionManager::new(
        Box::new(broker.connector()),
        topology,
        RetryPolicy::fixed(5, Duration::from_secs(5)),
    )
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_five_attempts_five_seconds_apart() {
    let broker = MemoryBroker::new();
    broker.fail_next_opens(usize::MAX);
    let mut conn = manager(&broker, Topology::NEWS);

    let t0 = Instant::now();
    let err = conn.connect().await.unwrap_err();

    assert_eq!(broker.open_attempts(), 5);
    // four pauses between five attempts, none after the last
    assert_eq!(t0.elapsed(), Duration::from_secs(20));
    assert!(matches!(err, BrokerError::Exhausted { attempts: 5, .. }));
    assert!(!conn.is_connected());
    assert!(broker.declared().is_empty());
}

#[tokio::test(start_paused = true)]
async fn recovers_on_third_attempt_and_declares_topology() {
    let broker = MemoryBroker::new();
    broker.fail_next_opens(2);
    let mut conn = manager(&broker, Topology::FUNDAMENTALS);

    let t0 = Instant::now();
    conn.connect().await.expect("third attempt succeeds");

    assert_eq!(broker.open_attempts(), 3);
    assert_eq!(t0.elapsed(), Duration::from_secs(10));
    assert!(conn.is_connected());
    assert_eq!(broker.declared(), vec![Topology::FUNDAMENTALS]);
}

#[tokio::test(start_paused = true)]
async fn ensure_connected_is_lazy_and_idempotent() {
    let broker = MemoryBroker::new();
    let mut conn = manager(&broker, Topology::NEWS);

    conn.ensure_connected().await.unwrap();
    conn.ensure_connected().await.unwrap();
    assert_eq!(broker.open_attempts(), 1);

    conn.close().await;
    assert_eq!(broker.closes(), 1);
    assert!(!conn.is_connected());

    conn.ensure_connected().await.unwrap();
    assert_eq!(broker.open_attempts(), 2);
    // declaring again on reconnect does not duplicate the topology
    assert_eq!(broker.declared(), vec![Topology::NEWS]);
}

#[test]
fn topology_names_are_bit_exact() {
    assert_eq!(Topology::NEWS.exchange, "market_news");
    assert_eq!(Topology::NEWS.queue, "news_queue");
    assert_eq!(Topology::FUNDAMENTALS.exchange, "fundamental_data");
    assert_eq!(Topology::FUNDAMENTALS.queue, "fundamentals_queue");
    assert_eq!(Topology::ROUTING_KEY, "");
}
