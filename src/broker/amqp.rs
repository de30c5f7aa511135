// src/broker/amqp.rs
//! RabbitMQ connector backed by `lapin`.

use async_trait::async_trait;
use lapin::{
    options::{
        BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    publisher_confirm::Confirmation,
    types::FieldTable,
    uri::{AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo},
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};

use super::{BrokerChannel, BrokerConnector, BrokerError, MessageProperties, Topology};
use crate::config::BrokerSettings;

pub struct AmqpConnector {
    settings: BrokerSettings,
}

impl AmqpConnector {
    pub fn new(settings: BrokerSettings) -> Self {
        Self { settings }
    }

    fn uri(&self) -> AMQPUri {
        let s = &self.settings;
        AMQPUri {
            scheme: AMQPScheme::AMQP,
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: s.user.clone(),
                    password: s.password.clone(),
                },
                host: s.host.clone(),
                port: s.port,
            },
            vhost: s.vhost.clone(),
            query: AMQPQueryString {
                heartbeat: Some(s.heartbeat_secs),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl BrokerConnector for AmqpConnector {
    async fn open(&self, topology: &Topology) -> Result<Box<dyn BrokerChannel>, BrokerError> {
        let connection = Connection::connect_uri(self.uri(), ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connect(format!("{}: {e}", self.describe())))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Connect(format!("failed to create channel: {e}")))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| BrokerError::Connect(format!("failed to enable confirms: {e}")))?;

        declare_topology(&channel, topology).await?;

        Ok(Box::new(AmqpChannel {
            connection,
            channel,
        }))
    }

    fn describe(&self) -> String {
        let s = &self.settings;
        format!("amqp://{}:{}{}", s.host, s.port, s.vhost)
    }
}

/// Declarations are idempotent; repeating them on every reconnect is safe.
async fn declare_topology(channel: &Channel, topology: &Topology) -> Result<(), BrokerError> {
    channel
        .exchange_declare(
            topology.exchange,
            ExchangeKind::Fanout,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| {
            BrokerError::Topology(format!("exchange {}: {e}", topology.exchange))
        })?;

    channel
        .queue_declare(
            topology.queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| BrokerError::Topology(format!("queue {}: {e}", topology.queue)))?;

    channel
        .queue_bind(
            topology.queue,
            topology.exchange,
            Topology::ROUTING_KEY,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| {
            BrokerError::Topology(format!(
                "bind {} -> {}: {e}",
                topology.exchange, topology.queue
            ))
        })?;

    Ok(())
}

struct AmqpChannel {
    connection: Connection,
    channel: Channel,
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: &MessageProperties,
    ) -> Result<(), BrokerError> {
        let props = BasicProperties::default()
            .with_content_type(properties.content_type.into())
            .with_delivery_mode(properties.delivery_mode);

        let confirm = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                body,
                props,
            )
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;

        match confirm.await {
            Ok(Confirmation::Nack(_)) => Err(BrokerError::Publish("broker nacked message".into())),
            Ok(_) => Ok(()),
            Err(e) => Err(BrokerError::Publish(e.to_string())),
        }
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if !self.connection.status().connected() {
            return Ok(());
        }
        self.connection
            .close(200, "shutdown")
            .await
            .map_err(|e| BrokerError::Connect(format!("close: {e}")))
    }
}
