//! Per-channel send primitive dispatch and the dead-letter envelope
//! (§4.3 steps 3-7).

use chrono::{DateTime, Utc};
use notify_common::QueueMessage;
use notify_providers::{EmailProvider, PushProvider};
use serde::Serialize;
use std::sync::Arc;

pub enum ChannelSender {
    Email(Arc<dyn EmailProvider>),
    Push(Arc<dyn PushProvider>),
}

impl ChannelSender {
    pub async fn send(&self, recipient: &str, subject: &str, body: &str) -> notify_common::PipelineResult<()> {
        match self {
            ChannelSender::Email(provider) => provider.send(recipient, subject, body).await,
            ChannelSender::Push(provider) => provider.send(recipient, subject, body).await,
        }
    }
}

/// Envelope published to the `failed` routing key, carrying the
/// original message plus why it ended up there.
#[derive(Debug, Clone, Serialize)]
pub struct FailedEnvelope {
    pub message: QueueMessage,
    pub error: String,
    pub retry_count: u32,
    pub failed_at: DateTime<Utc>,
}

impl FailedEnvelope {
    pub fn new(message: QueueMessage, error: impl Into<String>) -> Self {
        let retry_count = message.retry_count;
        Self {
            message,
            error: error.into(),
            retry_count,
            failed_at: Utc::now(),
        }
    }
}
