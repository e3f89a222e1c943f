use notify_common::{NotificationRecord, UserProfile};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, error, warn};

use crate::{keys, Result, StoreError};

/// A thin, cloneable handle onto the platform's Redis instance. All
/// operations are independent single-key commands.
#[derive(Clone)]
pub struct Store {
    conn: ConnectionManager,
}

impl Store {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client =
            redis::Client::open(redis_url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Liveness check for readiness probes.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Idempotency — ingress side (request_id scoped, §8 property 1)
    // ------------------------------------------------------------------

    /// Atomically record `request_id -> notification_id` only if absent.
    /// Returns `Some(existing_notification_id)` if a prior submission with
    /// this `request_id` already won the race.
    pub async fn reserve_request(
        &self,
        request_id: &str,
        notification_id: &str,
        ttl_secs: u64,
    ) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let key = keys::request(request_id);

        let set: bool = redis::cmd("SET")
            .arg(&key)
            .arg(notification_id)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map(|r| r.is_some())?;

        if set {
            Ok(None)
        } else {
            let existing: Option<String> = conn.get(&key).await?;
            Ok(existing)
        }
    }

    /// Release a reservation made by `reserve_request` when the pipeline
    /// fails before publish, so a retried submission is not permanently
    /// blocked behind a notification that was never created.
    pub async fn release_request(&self, request_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys::request(request_id)).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Notification records
    // ------------------------------------------------------------------

    pub async fn put_notification(&self, record: &NotificationRecord, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(record)?;
        conn.set_ex::<_, _, ()>(keys::notification(&record.notification_id), body, ttl_secs)
            .await?;
        Ok(())
    }

    pub async fn get_notification(&self, notification_id: &str) -> Result<Option<NotificationRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(keys::notification(notification_id)).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Read-modify-write status update. Not transactional against
    /// concurrent writers — the worker pipeline is the only writer after
    /// creation, so last-write-wins is acceptable here.
    pub async fn update_notification_status(
        &self,
        notification_id: &str,
        status: notify_common::NotificationStatus,
        error: Option<String>,
        ttl_secs: u64,
    ) -> Result<()> {
        let Some(mut record) = self.get_notification(notification_id).await? else {
            warn!(notification_id, "status update for unknown notification");
            return Err(StoreError::NotFound(notification_id.to_string()));
        };
        record.status = status;
        record.error = error;
        record.updated_at = chrono::Utc::now();
        self.put_notification(&record, ttl_secs).await
    }

    pub async fn append_user_notification(&self, user_id: &str, notification_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(keys::user_notifications(user_id), notification_id)
            .await?;
        Ok(())
    }

    /// Page through a user's notification ids, newest first.
    pub async fn list_user_notifications(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<String>, u64)> {
        let mut conn = self.conn.clone();
        let key = keys::user_notifications(user_id);
        let total: u64 = conn.llen(&key).await?;

        let start = (page.saturating_sub(1) as isize) * limit as isize;
        let end = start + limit as isize - 1;
        let ids: Vec<String> = conn.lrange(&key, start, end).await?;
        Ok((ids, total))
    }

    // ------------------------------------------------------------------
    // User profile cache (§4.1 step 2, 5 minute TTL)
    // ------------------------------------------------------------------

    pub async fn cache_user(&self, user_id: &str, profile: &UserProfile, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(profile)?;
        conn.set_ex::<_, _, ()>(keys::user(user_id), body, ttl_secs).await?;
        Ok(())
    }

    pub async fn get_cached_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(keys::user(user_id)).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Rendered template cache (§4.3 step 4, 1 hour TTL)
    // ------------------------------------------------------------------

    pub async fn cache_rendered_template(
        &self,
        code: &str,
        language: &str,
        version: Option<u32>,
        rendered: &serde_json::Value,
        ttl_secs: u64,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(rendered)?;
        conn.set_ex::<_, _, ()>(keys::template(code, language, version), body, ttl_secs)
            .await?;
        Ok(())
    }

    pub async fn get_cached_rendered_template(
        &self,
        code: &str,
        language: &str,
        version: Option<u32>,
    ) -> Result<Option<serde_json::Value>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(keys::template(code, language, version)).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Drop the cached entry for a specific `(code, language, version)`
    /// slot after a template write invalidates it.
    pub async fn invalidate_template_cache(
        &self,
        code: &str,
        language: &str,
        version: Option<u32>,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys::template(code, language, version)).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Rate limiting — fails open on any Redis error
    // ------------------------------------------------------------------

    /// Returns `(allowed, retry_after_secs)`. On Redis error, allows the
    /// request through rather than blocking traffic on a store outage.
    pub async fn check_rate_limit(&self, identifier: &str, limit_per_minute: u32) -> (bool, u64) {
        match self.try_check_rate_limit(identifier, limit_per_minute).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, identifier, "rate limit check failed, failing open");
                (true, 0)
            }
        }
    }

    async fn try_check_rate_limit(&self, identifier: &str, limit_per_minute: u32) -> Result<(bool, u64)> {
        let mut conn = self.conn.clone();
        let key = keys::rate_limit(identifier);

        let current: Option<u32> = conn.get(&key).await?;
        match current {
            None => {
                conn.set_ex::<_, _, ()>(&key, 1, 60).await?;
                Ok((true, 0))
            }
            Some(count) if count >= limit_per_minute => {
                let ttl: i64 = conn.ttl(&key).await?;
                Ok((false, ttl.max(1) as u64))
            }
            Some(_) => {
                conn.incr::<_, _, ()>(&key, 1).await?;
                Ok((true, 0))
            }
        }
    }

    // ------------------------------------------------------------------
    // Worker-side idempotency (channel scoped, §4.3 step 2)
    // ------------------------------------------------------------------

    pub async fn is_worker_processed(&self, channel: &str, request_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(keys::idempotency(channel, request_id)).await?;
        Ok(exists)
    }

    pub async fn mark_worker_processed(
        &self,
        channel: &str,
        request_id: &str,
        outcome: &str,
        ttl_secs: u64,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(keys::idempotency(channel, request_id), outcome, ttl_secs)
            .await?;
        debug!(channel, request_id, "worker idempotency marker written");
        Ok(())
    }
}
