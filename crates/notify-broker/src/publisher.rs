//! Publisher side of the broker: routes `QueueMessage`s by routing key
//! (§3.3 priority boundary) and DLQ envelopes to the `failed` routing key.

use lapin::{options::BasicPublishOptions, BasicProperties, Channel, Connection, ConnectionProperties};
use notify_common::QueueMessage;
use serde::Serialize;
use tracing::debug;

use crate::{BrokerError, Result};

pub struct Publisher {
    exchange: String,
    connection: Connection,
    channel: Channel,
}

impl Publisher {
    pub async fn connect(amqp_url: &str, exchange: &str, connection_name: &str) -> Result<Self> {
        let connection = Connection::connect(
            amqp_url,
            ConnectionProperties::default().with_connection_name(connection_name.into()),
        )
        .await
        .map_err(|e| BrokerError::Connection(e.to_string()))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        Ok(Self {
            exchange: exchange.to_string(),
            connection,
            channel,
        })
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Publish to the routing key selected by the message's own priority
    /// rule. Persistent delivery mode, priority carried as an AMQP header.
    pub async fn publish(&self, message: &QueueMessage) -> Result<()> {
        self.publish_to(message.routing_key(), message, Some(message.priority))
            .await
    }

    /// Publish to the dead-letter sink, preserving whatever envelope type
    /// the caller passes (a `QueueMessage` or a failure-annotated wrapper).
    pub async fn publish_failed<T: Serialize>(&self, envelope: &T) -> Result<()> {
        self.publish_to("failed", envelope, None).await
    }

    async fn publish_to<T: Serialize>(&self, routing_key: &str, payload: &T, priority: Option<u8>) -> Result<()> {
        let body = serde_json::to_vec(payload)?;
        self.send(routing_key, &body, priority).await
    }

    async fn send(&self, routing_key: &str, body: &[u8], priority: Option<u8>) -> Result<()> {
        let mut properties = BasicProperties::default()
            .with_delivery_mode(2)
            .with_content_type("application/json".into());
        if let Some(priority) = priority {
            properties = properties.with_priority(priority);
        }

        self.channel
            .basic_publish(&self.exchange, routing_key, BasicPublishOptions::default(), body, properties)
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?
            .await
            .map_err(|e| BrokerError::Publish(format!("publisher confirm failed: {e}")))?;

        debug!(routing_key, "message published");
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.channel
            .close(200, "shutdown")
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        self.connection
            .close(200, "shutdown")
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        Ok(())
    }
}
