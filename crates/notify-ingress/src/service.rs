//! Admission pipeline (§4.1): idempotency, user lookup, preference gate,
//! recipient resolution, publish, and record persistence.

use chrono::Utc;
use notify_broker::Publisher;
use notify_common::{
    NotificationRecord, NotificationRequest, NotificationStatus, PaginationMeta, PlatformError,
    QueueMessage, SubmitResponse,
};
use notify_directory::UserDirectoryClient;
use notify_store::Store;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{IngressError, Result};

pub struct IngressService {
    store: Store,
    directory: Arc<UserDirectoryClient>,
    publisher: Publisher,
    notification_ttl_secs: u64,
    max_retries: u32,
}

impl IngressService {
    pub fn new(
        store: Store,
        directory: Arc<UserDirectoryClient>,
        publisher: Publisher,
        notification_ttl_secs: u64,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            directory,
            publisher,
            notification_ttl_secs,
            max_retries,
        }
    }

    /// Runs the full admission contract. The idempotency reservation is
    /// made atomically up front (rather than strictly last, as spec.md's
    /// numbered steps suggest) so that N concurrent submissions under the
    /// same `request_id` truly produce one publish — the race the
    /// reservation exists to prevent can only be closed by claiming the
    /// slot before doing any of the side-effecting work. Any failure
    /// before publish releases the reservation so a corrected retry of
    /// the same `request_id` is not permanently shadowed by a
    /// never-created notification.
    pub async fn submit(&self, request: NotificationRequest, correlation_id: &str) -> Result<SubmitResponse> {
        let notification_id = Uuid::new_v4().to_string();

        let existing = self
            .store
            .reserve_request(&request.request_id, &notification_id, self.notification_ttl_secs)
            .await?;

        if let Some(existing_id) = existing {
            info!(request_id = %request.request_id, notification_id = %existing_id, "duplicate submission");
            let status = match self.store.get_notification(&existing_id).await? {
                Some(record) => record.status,
                None => NotificationStatus::Pending,
            };
            return Ok(SubmitResponse {
                notification_id: existing_id,
                status,
                created_at: Utc::now(),
                already_processed: true,
            });
        }

        match self.submit_reserved(&request, &notification_id, correlation_id).await {
            Ok(response) => Ok(response),
            Err(e) => {
                if let Err(release_err) = self.store.release_request(&request.request_id).await {
                    warn!(error = %release_err, request_id = %request.request_id, "failed to release idempotency reservation after admission failure");
                }
                Err(e)
            }
        }
    }

    async fn submit_reserved(
        &self,
        request: &NotificationRequest,
        notification_id: &str,
        correlation_id: &str,
    ) -> Result<SubmitResponse> {
        let profile = self
            .directory
            .get_user(&request.user_id)
            .await
            .map_err(|e| {
                warn!(error = %e, user_id = %request.user_id, "user directory lookup failed");
                IngressError::Platform(PlatformError::UserServiceUnavailable(e.to_string()))
            })?;

        if !profile.channel_enabled(request.notification_type) {
            return Err(IngressError::Platform(PlatformError::BlockedByPreference));
        }

        let recipient = profile
            .recipient(request.notification_type)
            .ok_or(IngressError::Platform(PlatformError::MissingRecipient))?
            .to_string();

        let created_at = Utc::now();
        let message = QueueMessage {
            notification_id: notification_id.to_string(),
            notification_type: request.notification_type,
            user_id: request.user_id.clone(),
            template_code: request.template_code.clone(),
            variables: request.variables.clone(),
            recipient,
            request_id: request.request_id.clone(),
            priority: request.priority,
            timestamp: created_at,
            retry_count: 0,
            max_retries: self.max_retries,
            correlation_id: correlation_id.to_string(),
        };

        self.publisher
            .publish(&message)
            .await
            .map_err(|e| IngressError::Platform(PlatformError::QueueUnavailable(e.to_string())))?;

        let record = NotificationRecord {
            notification_id: notification_id.to_string(),
            user_id: request.user_id.clone(),
            notification_type: request.notification_type,
            status: NotificationStatus::Pending,
            created_at,
            updated_at: created_at,
            request_id: request.request_id.clone(),
            error: None,
        };
        self.store.put_notification(&record, self.notification_ttl_secs).await?;
        self.store.append_user_notification(&request.user_id, notification_id).await?;

        info!(
            notification_id = %notification_id,
            routing_key = message.routing_key(),
            "notification admitted and published"
        );

        Ok(SubmitResponse {
            notification_id: notification_id.to_string(),
            status: NotificationStatus::Pending,
            created_at,
            already_processed: false,
        })
    }

    pub async fn get_notification(&self, notification_id: &str) -> Result<NotificationRecord> {
        self.store
            .get_notification(notification_id)
            .await?
            .ok_or_else(|| IngressError::Platform(PlatformError::NotFound(notification_id.to_string())))
    }

    pub async fn list_notifications(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<NotificationRecord>, PaginationMeta)> {
        let (ids, total) = self.store.list_user_notifications(user_id, page, limit).await?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.store.get_notification(&id).await? {
                records.push(record);
            }
        }

        Ok((records, PaginationMeta { page, limit, total }))
    }

    /// Readiness check: the KV store is the only hard dependency ingress
    /// needs to serve traffic (the user directory and broker are
    /// per-request, behind their own circuit breakers).
    pub async fn ping_dependencies(&self) -> Result<()> {
        self.store.ping().await.map_err(IngressError::from)
    }

    pub async fn apply_status_update(
        &self,
        update: &notify_common::NotificationStatusUpdate,
    ) -> Result<NotificationRecord> {
        self.store
            .update_notification_status(
                &update.notification_id,
                update.status,
                update.error.clone(),
                self.notification_ttl_secs,
            )
            .await
            .map_err(|e| match e {
                notify_store::StoreError::NotFound(id) => IngressError::Platform(PlatformError::NotFound(id)),
                other => IngressError::Store(other),
            })?;

        self.get_notification(&update.notification_id).await
    }
}
