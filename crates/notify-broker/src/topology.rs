//! Broker topology declaration (§4.2): one direct exchange, five durable
//! queues, dead-letter routing from the standard/priority queues to
//! `failed.queue`.

use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, ExchangeKind,
};
use tracing::info;

use crate::{BrokerError, Result};

/// Names of the five queues plus the exchange that routes to them.
#[derive(Debug, Clone)]
pub struct Topology {
    pub exchange: String,
    pub email_queue: String,
    pub email_priority_queue: String,
    pub push_queue: String,
    pub push_priority_queue: String,
    pub failed_queue: String,
}

impl Topology {
    /// Declare the exchange and all five queues, wiring standard and
    /// priority queues' dead-letter policy to `failed_queue`. Idempotent —
    /// safe to call on every process startup.
    pub async fn declare(&self, channel: &Channel) -> Result<()> {
        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Topology(format!("exchange declare failed: {e}")))?;

        self.declare_failed_queue(channel).await?;

        self.declare_routed_queue(channel, &self.email_queue, "email")
            .await?;
        self.declare_routed_queue(channel, &self.email_priority_queue, "email.priority")
            .await?;
        self.declare_routed_queue(channel, &self.push_queue, "push")
            .await?;
        self.declare_routed_queue(channel, &self.push_priority_queue, "push.priority")
            .await?;

        info!(exchange = %self.exchange, "broker topology declared");
        Ok(())
    }

    async fn declare_failed_queue(&self, channel: &Channel) -> Result<()> {
        channel
            .queue_declare(
                &self.failed_queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Topology(format!("failed queue declare failed: {e}")))?;

        channel
            .queue_bind(
                &self.failed_queue,
                &self.exchange,
                "failed",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Topology(format!("failed queue bind failed: {e}")))?;

        Ok(())
    }

    async fn declare_routed_queue(
        &self,
        channel: &Channel,
        queue_name: &str,
        routing_key: &str,
    ) -> Result<()> {
        let mut args = FieldTable::default();
        args.insert(
            "x-dead-letter-exchange".into(),
            self.exchange.clone().into(),
        );
        args.insert("x-dead-letter-routing-key".into(), "failed".into());

        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                args,
            )
            .await
            .map_err(|e| BrokerError::Topology(format!("queue {queue_name} declare failed: {e}")))?;

        channel
            .queue_bind(
                queue_name,
                &self.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Topology(format!("queue {queue_name} bind failed: {e}")))?;

        Ok(())
    }
}
