// src/broker/publisher.rs
use metrics::counter;
use tracing::{error, info};

use super::{BrokerError, ConnectionManager, MessageProperties, Topology};
use crate::ingest::types::PublishableRecord;

/// Result of a single publish attempt. A dropped record is not replayed.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// The write failed but the reconnect that followed succeeded.
    Dropped,
    /// The record was dropped and the broker could not be reached again.
    /// Further publishes in this cycle would only repeat the connect budget.
    BrokerDown,
}

impl PublishOutcome {
    pub fn is_published(self) -> bool {
        matches!(self, PublishOutcome::Published)
    }

    pub fn is_broker_down(self) -> bool {
        matches!(self, PublishOutcome::BrokerDown)
    }
}

/// Serializes records to JSON and publishes them to the pipeline's exchange.
pub struct Publisher {
    conn: ConnectionManager,
    properties: MessageProperties,
}

impl Publisher {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            properties: MessageProperties::persistent_json(),
        }
    }

    pub fn topology(&self) -> &Topology {
        self.conn.topology()
    }

    /// Initial connect; failure here is fatal for the service.
    pub async fn connect(&mut self) -> Result<(), BrokerError> {
        self.conn.connect().await
    }

    /// Publish one record. A failed broker write is logged and followed by
    /// exactly one reconnect; the record itself is dropped. `BrokerDown` is
    /// returned when no channel could be (re)opened.
    pub async fn publish(&mut self, record: &PublishableRecord) -> PublishOutcome {
        let exchange = self.conn.topology().exchange;

        let body = match serde_json::to_vec(record) {
            Ok(b) => b,
            Err(e) => {
                self.fail(record, &BrokerError::from(e));
                return PublishOutcome::Dropped;
            }
        };

        // ensure_connected already reconnects inline; no second attempt here.
        if let Err(e) = self.conn.ensure_connected().await {
            self.fail(record, &e);
            return PublishOutcome::BrokerDown;
        }

        let res = match self.conn.channel() {
            Some(ch) => {
                ch.publish(exchange, Topology::ROUTING_KEY, &body, &self.properties)
                    .await
            }
            None => Err(BrokerError::ChannelClosed),
        };

        match res {
            Ok(()) => {
                counter!("feed_published_total", "exchange" => exchange).increment(1);
                info!(
                    target: "ingest",
                    exchange,
                    identity = record.identity(),
                    "published {}",
                    record.headline()
                );
                PublishOutcome::Published
            }
            Err(e) => {
                self.fail(record, &e);
                if self.recover().await {
                    PublishOutcome::Dropped
                } else {
                    PublishOutcome::BrokerDown
                }
            }
        }
    }

    fn fail(&self, record: &PublishableRecord, e: &BrokerError) {
        let exchange = self.conn.topology().exchange;
        counter!("feed_publish_failures_total", "exchange" => exchange).increment(1);
        error!(
            target: "ingest",
            exchange,
            identity = record.identity(),
            error = %e,
            "publish failed, record dropped"
        );
    }

    /// One reconnect; `false` when the broker is still unreachable.
    async fn recover(&mut self) -> bool {
        counter!("feed_reconnects_total", "exchange" => self.conn.topology().exchange).increment(1);
        match self.conn.connect().await {
            Ok(()) => true,
            Err(e) => {
                error!(target: "ingest", error = %e, "reconnect after publish failure failed");
                false
            }
        }
    }

    pub async fn close(&mut self) {
        self.conn.close().await;
    }
}
