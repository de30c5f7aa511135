// src/broker/mod.rs
pub mod amqp;
pub mod connection;
pub mod memory;
pub mod publisher;

use async_trait::async_trait;
use thiserror::Error;

pub use connection::ConnectionManager;
pub use publisher::{PublishOutcome, Publisher};

/// Durable fanout exchange plus one durable queue bound to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Topology {
    pub exchange: &'static str,
    pub queue: &'static str,
}

impl Topology {
    pub const NEWS: Topology = Topology {
        exchange: "market_news",
        queue: "news_queue",
    };
    pub const FUNDAMENTALS: Topology = Topology {
        exchange: "fundamental_data",
        queue: "fundamentals_queue",
    };

    /// Fanout exchanges ignore the routing key; it is always empty.
    pub const ROUTING_KEY: &'static str = "";
}

/// AMQP basic properties attached to every message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageProperties {
    pub content_type: &'static str,
    /// 2 = persistent.
    pub delivery_mode: u8,
}

impl MessageProperties {
    pub const PERSISTENT_DELIVERY: u8 = 2;

    pub fn persistent_json() -> Self {
        Self {
            content_type: "application/json",
            delivery_mode: Self::PERSISTENT_DELIVERY,
        }
    }
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connect(String),
    #[error("topology declaration failed: {0}")]
    Topology(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("broker channel is not open")]
    ChannelClosed,
    #[error("encoding message body: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("broker unreachable after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<BrokerError>,
    },
}

/// Opens a connection + channel and declares the topology on it.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn open(&self, topology: &Topology) -> Result<Box<dyn BrokerChannel>, BrokerError>;

    /// Human-readable target for logs (never includes credentials).
    fn describe(&self) -> String;
}

/// A single open connection/channel pair.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    fn is_open(&self) -> bool;

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: &MessageProperties,
    ) -> Result<(), BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}
