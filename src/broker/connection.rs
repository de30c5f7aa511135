// src/broker/connection.rs
use metrics::counter;
use tracing::{info, warn};

use super::{BrokerChannel, BrokerConnector, BrokerError, Topology};
use crate::retry::RetryPolicy;

/// Owns the single logical connection/channel to the broker for one pipeline.
pub struct ConnectionManager {
    connector: Box<dyn BrokerConnector>,
    topology: Topology,
    retry: RetryPolicy,
    channel: Option<Box<dyn BrokerChannel>>,
}

impl ConnectionManager {
    pub fn new(connector: Box<dyn BrokerConnector>, topology: Topology, retry: RetryPolicy) -> Self {
        Self {
            connector,
            topology,
            retry,
            channel: None,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn is_connected(&self) -> bool {
        self.channel.as_ref().is_some_and(|c| c.is_open())
    }

    /// Open a fresh connection and declare the topology, retrying per policy.
    ///
    /// Any previous channel is dropped first. Returns `BrokerError::Exhausted`
    /// once the attempt budget is spent.
    pub async fn connect(&mut self) -> Result<(), BrokerError> {
        if let Some(old) = self.channel.take() {
            if let Err(e) = old.close().await {
                tracing::debug!(error = %e, "closing stale broker channel");
            }
        }

        let target = self.connector.describe();
        let connector = &self.connector;
        let topology = &self.topology;
        let what = format!("connect to broker at {target}");

        let channel = self
            .retry
            .run(&what, move |_attempt| connector.open(topology))
            .await
            .map_err(|last| BrokerError::Exhausted {
                attempts: self.retry.max_attempts.max(1),
                last: Box::new(last),
            })?;

        info!(
            target: "ingest",
            broker = %target,
            exchange = self.topology.exchange,
            queue = self.topology.queue,
            "connected to broker and declared topology"
        );
        self.channel = Some(channel);
        Ok(())
    }

    /// Reconnect inline when the channel is missing or closed.
    pub async fn ensure_connected(&mut self) -> Result<(), BrokerError> {
        if self.is_connected() {
            return Ok(());
        }
        warn!(
            target: "ingest",
            exchange = self.topology.exchange,
            "broker channel not open, reconnecting"
        );
        counter!("feed_reconnects_total", "exchange" => self.topology.exchange).increment(1);
        self.connect().await
    }

    /// The open channel, if any.
    pub fn channel(&self) -> Option<&dyn BrokerChannel> {
        self.channel.as_deref()
    }

    /// Release the connection. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(ch) = self.channel.take() {
            match ch.close().await {
                Ok(()) => info!(target: "ingest", "broker connection closed"),
                Err(e) => warn!(target: "ingest", error = %e, "broker connection close failed"),
            }
        }
    }
}
