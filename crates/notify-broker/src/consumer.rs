//! Consumer side of the broker. A worker binds both the standard and
//! priority queue for its channel (§4.3) and polls them as one merged
//! stream, tracking AMQP delivery tags behind opaque receipt handles.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{select_all, StreamExt};
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer as LapinConsumer,
};
use notify_common::QueueMessage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::{BrokerError, Result};

/// A message pulled off the broker, with the receipt handle needed to
/// ack/nack it.
pub struct Delivery {
    pub message: QueueMessage,
    pub receipt_handle: String,
}

#[async_trait]
pub trait QueueConsumer: Send + Sync {
    async fn poll(&self, max_messages: u32) -> Result<Vec<Delivery>>;
    async fn ack(&self, receipt_handle: &str) -> Result<()>;
    /// Reject without requeue — used after a terminal failure has already
    /// been published to the DLQ by the caller.
    async fn reject(&self, receipt_handle: &str) -> Result<()>;
    fn is_healthy(&self) -> bool;
    async fn stop(&self);
}

pub struct AmqpConsumer {
    connection: Connection,
    channel: Channel,
    exchange: String,
    consumers: Mutex<Vec<LapinConsumer>>,
    running: AtomicBool,
    delivery_tag_counter: AtomicU64,
    delivery_tags: Arc<DashMap<String, u64>>,
}

impl AmqpConsumer {
    /// Connect and bind a consumer per queue name, all sharing one channel
    /// and one QoS prefetch. `exchange` is used only to dead-letter
    /// envelopes that fail to deserialize (§4.3 step 1).
    pub async fn connect(
        amqp_url: &str,
        exchange: &str,
        queue_names: &[String],
        prefetch_count: u16,
        connection_name: &str,
    ) -> Result<Self> {
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

        channel
            .basic_qos(prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::Connection(format!("QoS failed: {e}")))?;

        let mut consumers = Vec::with_capacity(queue_names.len());
        for (i, queue_name) in queue_names.iter().enumerate() {
            let tag = format!("{connection_name}-{i}-{}", uuid::Uuid::new_v4());
            let consumer = channel
                .basic_consume(
                    queue_name,
                    &tag,
                    BasicConsumeOptions {
                        no_ack: false,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| BrokerError::Connection(format!("consume {queue_name} failed: {e}")))?;
            consumers.push(consumer);
        }

        Ok(Self {
            connection,
            channel,
            exchange: exchange.to_string(),
            consumers: Mutex::new(consumers),
            running: AtomicBool::new(true),
            delivery_tag_counter: AtomicU64::new(0),
            delivery_tags: Arc::new(DashMap::new()),
        })
    }

    /// Publish raw, undeserializable bytes straight to the `failed` routing
    /// key, preserving the message the pipeline could never have acted on.
    async fn dead_letter_raw(&self, body: &[u8]) -> Result<()> {
        self.channel
            .basic_publish(
                &self.exchange,
                "failed",
                BasicPublishOptions::default(),
                body,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?
            .await
            .map_err(|e| BrokerError::Publish(format!("publisher confirm failed: {e}")))?;
        Ok(())
    }

    fn generate_receipt_handle(&self, delivery_tag: u64) -> String {
        let handle = format!(
            "{}:{}",
            delivery_tag,
            self.delivery_tag_counter.fetch_add(1, Ordering::SeqCst)
        );
        self.delivery_tags.insert(handle.clone(), delivery_tag);
        handle
    }

    fn take_delivery_tag(&self, receipt_handle: &str) -> Option<u64> {
        self.delivery_tags
            .remove(receipt_handle)
            .map(|(_, tag)| tag)
    }
}

#[async_trait]
impl QueueConsumer for AmqpConsumer {
    async fn poll(&self, max_messages: u32) -> Result<Vec<Delivery>> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(BrokerError::Stopped);
        }

        let consumers = self.consumers.lock().await;
        let mut merged = select_all(consumers.iter().map(|c| c.clone()));
        drop(consumers);

        let mut deliveries = Vec::with_capacity(max_messages as usize);
        let timeout = tokio::time::Duration::from_millis(200);

        for _ in 0..max_messages {
            match tokio::time::timeout(timeout, merged.next()).await {
                Ok(Some(Ok(delivery))) => match serde_json::from_slice::<QueueMessage>(&delivery.data) {
                    Ok(message) => {
                        let receipt_handle = self.generate_receipt_handle(delivery.delivery_tag);
                        deliveries.push(Delivery {
                            message,
                            receipt_handle,
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "malformed envelope on queue, dead-lettering and dropping");
                        if let Err(dlq_err) = self.dead_letter_raw(&delivery.data).await {
                            error!(error = %dlq_err, "failed to dead-letter malformed envelope");
                        }
                        let _ = self
                            .channel
                            .basic_ack(delivery.delivery_tag, BasicAckOptions::default())
                            .await;
                    }
                },
                Ok(Some(Err(e))) => {
                    error!(error = %e, "error receiving delivery");
                    break;
                }
                Ok(None) => {
                    warn!("consumer stream ended");
                    break;
                }
                Err(_) => break,
            }
        }

        if !deliveries.is_empty() {
            debug!(count = deliveries.len(), "polled deliveries");
        }

        Ok(deliveries)
    }

    async fn ack(&self, receipt_handle: &str) -> Result<()> {
        let delivery_tag = self
            .take_delivery_tag(receipt_handle)
            .ok_or_else(|| BrokerError::NotFound(receipt_handle.to_string()))?;

        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| BrokerError::Consume(format!("ack failed: {e}")))?;

        Ok(())
    }

    async fn reject(&self, receipt_handle: &str) -> Result<()> {
        let delivery_tag = self
            .take_delivery_tag(receipt_handle)
            .ok_or_else(|| BrokerError::NotFound(receipt_handle.to_string()))?;

        self.channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    requeue: false,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BrokerError::Consume(format!("reject failed: {e}")))?;

        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.channel.close(200, "shutdown").await;
        let _ = self.connection.close(200, "shutdown").await;
    }
}
