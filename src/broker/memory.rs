// src/broker/memory.rs
//! In-process broker used by dry-run mode and by tests.
//!
//! Records every connection attempt, topology declaration and published
//! message, and can be told to fail the next N opens or publishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{BrokerChannel, BrokerConnector, BrokerError, MessageProperties, Topology};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
    pub properties: MessageProperties,
}

impl PublishedMessage {
    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct State {
    open_attempts: usize,
    fail_opens: usize,
    fail_publishes: usize,
    declared: Vec<Topology>,
    published: Vec<PublishedMessage>,
    closes: usize,
}

/// Cheap to clone; clones share the same recorded state.
#[derive(Clone, Debug, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail the next `n` calls to `open`.
    pub fn fail_next_opens(&self, n: usize) {
        self.state().fail_opens = n;
    }

    /// Fail the next `n` publishes; each failure also closes that channel.
    pub fn fail_next_publishes(&self, n: usize) {
        self.state().fail_publishes = n;
    }

    pub fn open_attempts(&self) -> usize {
        self.state().open_attempts
    }

    pub fn declared(&self) -> Vec<Topology> {
        self.state().declared.clone()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state().published.clone()
    }

    pub fn published_count(&self) -> usize {
        self.state().published.len()
    }

    pub fn closes(&self) -> usize {
        self.state().closes
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            broker: self.clone(),
        }
    }
}

pub struct MemoryConnector {
    broker: MemoryBroker,
}

#[async_trait]
impl BrokerConnector for MemoryConnector {
    async fn open(&self, topology: &Topology) -> Result<Box<dyn BrokerChannel>, BrokerError> {
        let mut st = self.broker.state();
        st.open_attempts += 1;
        if st.fail_opens > 0 {
            st.fail_opens -= 1;
            return Err(BrokerError::Connect("memory broker refused connection".into()));
        }
        if !st.declared.contains(topology) {
            st.declared.push(*topology);
        }
        Ok(Box::new(MemoryChannel {
            broker: self.broker.clone(),
            open: AtomicBool::new(true),
        }))
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

struct MemoryChannel {
    broker: MemoryBroker,
    open: AtomicBool,
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: &MessageProperties,
    ) -> Result<(), BrokerError> {
        if !self.is_open() {
            return Err(BrokerError::ChannelClosed);
        }
        let mut st = self.broker.state();
        if st.fail_publishes > 0 {
            st.fail_publishes -= 1;
            self.open.store(false, Ordering::SeqCst);
            return Err(BrokerError::Publish("memory broker dropped the channel".into()));
        }
        tracing::debug!(exchange, bytes = body.len(), "memory broker accepted message");
        st.published.push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body: body.to_vec(),
            properties: properties.clone(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if self.open.swap(false, Ordering::SeqCst) {
            self.broker.state().closes += 1;
        }
        Ok(())
    }
}
