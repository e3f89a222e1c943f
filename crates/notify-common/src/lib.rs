//! Shared wire types and error taxonomy for the notification platform.
//!
//! Every crate in the workspace depends on this one for the types that
//! cross process boundaries (HTTP bodies, broker envelopes, KV records)
//! so that serialization stays consistent end to end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod logging;

// ============================================================================
// Channel & notification type
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Email,
    Push,
}

impl NotificationType {
    /// Routing key for standard-priority traffic on this channel.
    pub fn routing_key(&self) -> &'static str {
        match self {
            NotificationType::Email => "email",
            NotificationType::Push => "push",
        }
    }

    /// Routing key for priority traffic (priority >= 5) on this channel.
    pub fn priority_routing_key(&self) -> &'static str {
        match self {
            NotificationType::Email => "email.priority",
            NotificationType::Push => "push.priority",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Email => "email",
            NotificationType::Push => "push",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Ingress request/response
// ============================================================================

/// Variable payload attached to a notification request. Free-form, but
/// tagged as JSON values rather than an untyped blob so downstream code
/// can pattern-match without re-parsing.
pub type VariableMap = std::collections::BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationRequest {
    pub notification_type: NotificationType,
    pub user_id: String,
    pub template_code: String,
    #[serde(default)]
    pub variables: VariableMap,
    /// Client-supplied idempotency key.
    pub request_id: String,
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Delivered,
    Failed,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    pub notification_id: String,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    /// Set when this submission was recognized as a duplicate of a prior
    /// request with the same `request_id`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub already_processed: bool,
}

// ============================================================================
// Broker envelope
// ============================================================================

/// Internal envelope placed on the broker. Adds routing and retry
/// bookkeeping on top of the client-facing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub notification_id: String,
    pub notification_type: NotificationType,
    pub user_id: String,
    pub template_code: String,
    #[serde(default)]
    pub variables: VariableMap,
    pub recipient: String,
    pub request_id: String,
    pub priority: u8,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    pub correlation_id: String,
}

impl QueueMessage {
    pub fn routing_key(&self) -> &'static str {
        if self.priority >= 5 {
            self.notification_type.priority_routing_key()
        } else {
            self.notification_type.routing_key()
        }
    }
}

// ============================================================================
// Notification record (status store)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationRecord {
    pub notification_id: String,
    pub user_id: String,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub request_id: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationStatusUpdate {
    pub notification_id: String,
    pub status: NotificationStatus,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

// ============================================================================
// Response envelope (HTTP API)
// ============================================================================

/// Response envelope shared by every ingress HTTP endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PaginationMeta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            meta: None,
        }
    }

    pub fn ok_with_meta(data: T, meta: PaginationMeta) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            meta: Some(meta),
        }
    }

    pub fn err(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: Some(message.into()),
            meta: None,
        }
    }
}

// ============================================================================
// Error taxonomy (kinds, not type names — see spec §7)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Preference,
    RateLimit,
    Dependency,
    NotFound,
    TerminalDelivery,
    TransientDelivery,
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("blocked by recipient preference")]
    BlockedByPreference,

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("user directory unavailable: {0}")]
    UserServiceUnavailable(String),

    #[error("missing recipient address for channel")]
    MissingRecipient,

    #[error("broker unavailable: {0}")]
    QueueUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("dependency error: {0}")]
    Dependency(String),
}

impl PlatformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlatformError::Validation(_) => ErrorKind::Validation,
            PlatformError::Authentication(_) => ErrorKind::Authentication,
            PlatformError::BlockedByPreference => ErrorKind::Preference,
            PlatformError::RateLimitExceeded { .. } => ErrorKind::RateLimit,
            PlatformError::UserServiceUnavailable(_) => ErrorKind::Dependency,
            PlatformError::MissingRecipient => ErrorKind::Validation,
            PlatformError::QueueUnavailable(_) => ErrorKind::Dependency,
            PlatformError::NotFound(_) => ErrorKind::NotFound,
            PlatformError::Dependency(_) => ErrorKind::Dependency,
        }
    }

    /// HTTP status code this error should surface as.
    pub fn status_code(&self) -> u16 {
        match self {
            PlatformError::Validation(_) | PlatformError::MissingRecipient => 400,
            PlatformError::Authentication(_) => 401,
            PlatformError::BlockedByPreference => 403,
            PlatformError::RateLimitExceeded { .. } => 429,
            PlatformError::NotFound(_) => 404,
            PlatformError::UserServiceUnavailable(_) | PlatformError::QueueUnavailable(_) => 503,
            PlatformError::Dependency(_) => 503,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;

// ============================================================================
// Worker-side error classification (spec §4.3)
// ============================================================================

/// Whether a worker-pipeline failure should be retried or routed straight
/// to the dead-letter queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryable {
    Yes,
    No,
}

#[derive(Debug, Clone)]
pub struct PipelineError {
    pub retryable: Retryable,
    pub detail: String,
}

impl PipelineError {
    pub fn retryable(detail: impl Into<String>) -> Self {
        Self {
            retryable: Retryable::Yes,
            detail: detail.into(),
        }
    }

    pub fn terminal(detail: impl Into<String>) -> Self {
        Self {
            retryable: Retryable::No,
            detail: detail.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable == Retryable::Yes
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.detail)
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

// ============================================================================
// User directory contract
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserPreferences {
    #[serde(default = "default_true")]
    pub email: bool,
    #[serde(default = "default_true")]
    pub push: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub push_token: Option<String>,
    #[serde(default)]
    pub preferences: UserPreferences,
}

impl UserProfile {
    pub fn channel_enabled(&self, channel: NotificationType) -> bool {
        match channel {
            NotificationType::Email => self.preferences.email,
            NotificationType::Push => self.preferences.push,
        }
    }

    pub fn recipient(&self, channel: NotificationType) -> Option<&str> {
        match channel {
            NotificationType::Email => self.email.as_deref(),
            NotificationType::Push => self.push_token.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_key_boundary_at_five() {
        let msg = QueueMessage {
            notification_id: "n1".into(),
            notification_type: NotificationType::Email,
            user_id: "u1".into(),
            template_code: "welcome".into(),
            variables: VariableMap::new(),
            recipient: "a@b.com".into(),
            request_id: "r1".into(),
            priority: 5,
            timestamp: Utc::now(),
            retry_count: 0,
            max_retries: 3,
            correlation_id: "c1".into(),
        };
        assert_eq!(msg.routing_key(), "email.priority");

        let mut below = msg.clone();
        below.priority = 4;
        assert_eq!(below.routing_key(), "email");
    }

    #[test]
    fn error_status_codes() {
        assert_eq!(PlatformError::BlockedByPreference.status_code(), 403);
        assert_eq!(
            PlatformError::RateLimitExceeded { retry_after_secs: 5 }.status_code(),
            429
        );
        assert_eq!(PlatformError::NotFound("x".into()).status_code(), 404);
    }
}
