//! Push send primitive (§4.3 step 5) via Firebase Cloud Messaging's
//! legacy HTTP endpoint.

use async_trait::async_trait;
use notify_common::{PipelineError, PipelineResult};
use serde::Deserialize;
use tracing::{error, warn};

#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn send(&self, device_token: &str, title: &str, body: &str) -> PipelineResult<()>;
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    failure: u32,
    #[serde(default)]
    results: Vec<FcmResult>,
}

#[derive(Debug, Deserialize, Default)]
struct FcmResult {
    #[serde(default)]
    error: Option<String>,
}

const TERMINAL_FCM_ERRORS: &[&str] = &["NotRegistered", "InvalidRegistration", "MismatchSenderId"];

pub struct FcmPushProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl FcmPushProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://fcm.googleapis.com")
    }

    /// Same as [`Self::new`] but against a custom endpoint, for tests.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("reqwest client builds"),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PushProvider for FcmPushProvider {
    async fn send(&self, device_token: &str, title: &str, body: &str) -> PipelineResult<()> {
        let payload = serde_json::json!({
            "to": device_token,
            "notification": {"title": title, "body": body},
        });

        let response = self
            .http
            .post(format!("{}/fcm/send", self.base_url))
            .header("Authorization", format!("key={}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::retryable(format!("fcm request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(PipelineError::retryable(format!("fcm transient status {status}")));
        }
        if !status.is_success() {
            return Err(PipelineError::terminal(format!("fcm rejected message: {status}")));
        }

        let body: FcmResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::retryable(format!("fcm response unparseable: {e}")))?;

        if body.failure == 0 {
            return Ok(());
        }

        let reason = body
            .results
            .iter()
            .find_map(|r| r.error.clone())
            .unwrap_or_else(|| "unknown".to_string());

        if TERMINAL_FCM_ERRORS.contains(&reason.as_str()) {
            error!(device_token, reason, "fcm rejected device token permanently");
            Err(PipelineError::terminal(format!("fcm error: {reason}")))
        } else {
            warn!(device_token, reason, "fcm send failed transiently");
            Err(PipelineError::retryable(format!("fcm error: {reason}")))
        }
    }
}
