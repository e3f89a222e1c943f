//! Channel-agnostic consumer loop driving the per-message pipeline
//! (§4.3). One instance per channel (email, push).

use std::sync::Arc;
use std::time::Duration;

use notify_breaker::CircuitBreaker;
use notify_broker::{AmqpConsumer, Delivery, Publisher, QueueConsumer};
use notify_common::{NotificationStatus, NotificationStatusUpdate, NotificationType, QueueMessage};
use notify_directory::UserDirectoryClient;
use notify_store::Store;
use notify_template::TemplateEngine;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::pipeline::{ChannelSender, FailedEnvelope};
use crate::status::StatusClient;

pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub exponential_base: f64,
    pub max_delay_ms: u64,
}

pub struct ChannelWorker {
    pub channel: NotificationType,
    pub consumer: AmqpConsumer,
    pub publisher: Publisher,
    pub store: Store,
    pub templates: Arc<TemplateEngine>,
    /// Push workers re-fetch the device token on every delivery; email
    /// workers trust the address already resolved at ingress.
    pub directory: Option<Arc<UserDirectoryClient>>,
    pub breaker: Arc<CircuitBreaker>,
    pub sender: ChannelSender,
    pub status_client: Arc<StatusClient>,
    pub retry: RetryPolicy,
    pub notification_ttl_secs: u64,
    pub idempotency_ttl_secs: u64,
    pub prefetch_count: u32,
}

impl ChannelWorker {
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(channel = %self.channel, "worker starting");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let deliveries = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.consumer.poll(self.prefetch_count) => result,
            };

            let deliveries = match deliveries {
                Ok(d) => d,
                Err(e) => {
                    error!(channel = %self.channel, error = %e, "poll failed");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    continue;
                }
            };

            for delivery in deliveries {
                self.process(delivery).await;
            }
        }

        self.consumer.stop().await;
        info!(channel = %self.channel, "worker stopped");
    }

    async fn process(&self, delivery: Delivery) {
        let message = delivery.message.clone();
        let channel_key = self.channel.as_str();

        match self.store.is_worker_processed(channel_key, &message.request_id).await {
            Ok(true) => {
                debug!(request_id = %message.request_id, "already processed, skipping");
                let _ = self.consumer.ack(&delivery.receipt_handle).await;
                return;
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "idempotency check failed, proceeding"),
        }

        match self.attempt(&message).await {
            Ok(()) => self.finalize_success(&delivery, &message).await,
            Err(err) => self.finalize_failure(&delivery, &message, err).await,
        }
    }

    async fn attempt(&self, message: &QueueMessage) -> notify_common::PipelineResult<()> {
        let recipient = self.resolve_recipient(message).await?;

        let rendered = self
            .templates
            .render(&message.template_code, &message.variables, None)
            .await
            .map_err(|e| match e {
                notify_template::TemplateError::NotFound(..) | notify_template::TemplateError::MissingVariable(_) => {
                    notify_common::PipelineError::terminal(e.to_string())
                }
                notify_template::TemplateError::InvalidSyntax(_) => notify_common::PipelineError::terminal(e.to_string()),
                _ => notify_common::PipelineError::retryable(e.to_string()),
            })?;

        if !self.breaker.allow_request() {
            return Err(notify_common::PipelineError::retryable("provider circuit breaker open"));
        }

        match self.sender.send(&recipient, &rendered.subject, &rendered.body).await {
            Ok(()) => {
                self.breaker.record_success();
                Ok(())
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e)
            }
        }
    }

    async fn resolve_recipient(&self, message: &QueueMessage) -> notify_common::PipelineResult<String> {
        match (self.channel, &self.directory) {
            (NotificationType::Push, Some(directory)) => {
                let profile = directory
                    .get_user(&message.user_id)
                    .await
                    .map_err(|e| notify_common::PipelineError::retryable(e.to_string()))?;
                profile
                    .push_token
                    .ok_or_else(|| notify_common::PipelineError::terminal("user has no push token"))
            }
            _ => Ok(message.recipient.clone()),
        }
    }

    async fn finalize_success(&self, delivery: &Delivery, message: &QueueMessage) {
        self.persist_status(message, NotificationStatus::Delivered, None).await;
        self.mark_processed(message, "delivered").await;
        if let Err(e) = self.consumer.ack(&delivery.receipt_handle).await {
            error!(error = %e, notification_id = %message.notification_id, "ack failed after successful delivery");
        }
    }

    async fn finalize_failure(&self, delivery: &Delivery, message: &QueueMessage, err: notify_common::PipelineError) {
        let exhausted = notify_breaker::exhausted(message.retry_count, message.max_retries);

        if err.is_retryable() && !exhausted {
            self.retry(delivery, message, &err).await;
            return;
        }

        warn!(
            notification_id = %message.notification_id,
            retryable = err.is_retryable(),
            exhausted,
            error = %err,
            "routing message to dead-letter queue"
        );

        let envelope = FailedEnvelope::new(message.clone(), err.to_string());
        if let Err(e) = self.publisher.publish_failed(&envelope).await {
            error!(error = %e, notification_id = %message.notification_id, "failed to publish to dead-letter queue, rejecting without requeue");
            let _ = self.consumer.reject(&delivery.receipt_handle).await;
            return;
        }

        self.persist_status(message, NotificationStatus::Failed, Some(err.to_string())).await;
        self.mark_processed(message, "failed").await;

        if let Err(e) = self.consumer.ack(&delivery.receipt_handle).await {
            error!(error = %e, notification_id = %message.notification_id, "ack failed after dead-lettering");
        }
    }

    async fn retry(&self, delivery: &Delivery, message: &QueueMessage, err: &notify_common::PipelineError) {
        let delay_ms = notify_breaker::backoff_delay_ms(
            message.retry_count,
            self.retry.base_delay_ms,
            self.retry.exponential_base,
            self.retry.max_delay_ms,
        );
        debug!(notification_id = %message.notification_id, delay_ms, error = %err, "scheduling retry");
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        let mut next = message.clone();
        next.retry_count += 1;

        match self.publisher.publish(&next).await {
            Ok(()) => {
                if let Err(e) = self.consumer.ack(&delivery.receipt_handle).await {
                    error!(error = %e, "ack failed after republish");
                }
            }
            Err(e) => {
                error!(error = %e, notification_id = %message.notification_id, "republish failed, rejecting without requeue");
                let _ = self.consumer.reject(&delivery.receipt_handle).await;
            }
        }
    }

    async fn persist_status(&self, message: &QueueMessage, status: NotificationStatus, error: Option<String>) {
        if let Err(e) = self
            .store
            .update_notification_status(&message.notification_id, status, error.clone(), self.notification_ttl_secs)
            .await
        {
            warn!(error = %e, notification_id = %message.notification_id, "failed to persist status locally");
        }

        self.status_client
            .post_status(
                self.channel,
                &NotificationStatusUpdate {
                    notification_id: message.notification_id.clone(),
                    status,
                    error,
                },
            )
            .await;
    }

    async fn mark_processed(&self, message: &QueueMessage, outcome: &str) {
        if let Err(e) = self
            .store
            .mark_worker_processed(self.channel.as_str(), &message.request_id, outcome, self.idempotency_ttl_secs)
            .await
        {
            warn!(error = %e, notification_id = %message.notification_id, "failed to write worker idempotency marker");
        }
    }
}
