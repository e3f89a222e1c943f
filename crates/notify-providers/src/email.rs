//! Email send primitive (§4.3 step 5): SMTP or SendGrid, selected at
//! construction from whichever provider credentials are configured.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use notify_common::{PipelineError, PipelineResult};
use tracing::{error, warn};

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> PipelineResult<()>;
}

pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

pub struct SmtpEmailProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpEmailProvider {
    pub fn new(config: SmtpConfig) -> PipelineResult<Self> {
        let credentials = Credentials::new(config.username, config.password);
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| PipelineError::terminal(format!("invalid smtp host: {e}")))?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address,
        })
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailProvider {
    async fn send(&self, to: &str, subject: &str, body: &str) -> PipelineResult<()> {
        let message = Message::builder()
            .from(self.from_address.parse().map_err(|e| {
                PipelineError::terminal(format!("invalid from address {}: {e}", self.from_address))
            })?)
            .to(to
                .parse()
                .map_err(|e| PipelineError::terminal(format!("invalid recipient address {to}: {e}")))?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| PipelineError::terminal(format!("failed to build message: {e}")))?;

        match self.transport.send(message).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_permanent() => {
                error!(error = %e, to, "smtp send rejected permanently");
                Err(PipelineError::terminal(format!("smtp permanent failure: {e}")))
            }
            Err(e) => {
                warn!(error = %e, to, "smtp send failed transiently");
                Err(PipelineError::retryable(format!("smtp transient failure: {e}")))
            }
        }
    }
}

pub struct SendGridEmailProvider {
    http: reqwest::Client,
    api_key: String,
    from_address: String,
    base_url: String,
}

impl SendGridEmailProvider {
    pub fn new(api_key: impl Into<String>, from_address: impl Into<String>) -> Self {
        Self::with_base_url(api_key, from_address, "https://api.sendgrid.com")
    }

    /// Same as [`Self::new`] but against a custom endpoint, for pointing
    /// at a sandbox or a mock server in tests.
    pub fn with_base_url(api_key: impl Into<String>, from_address: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("reqwest client builds"),
            api_key: api_key.into(),
            from_address: from_address.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl EmailProvider for SendGridEmailProvider {
    async fn send(&self, to: &str, subject: &str, body: &str) -> PipelineResult<()> {
        let payload = serde_json::json!({
            "personalizations": [{"to": [{"email": to}]}],
            "from": {"email": self.from_address},
            "subject": subject,
            "content": [{"type": "text/plain", "value": body}],
        });

        let response = self
            .http
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::retryable(format!("sendgrid request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 429 || status.is_server_error() {
            Err(PipelineError::retryable(format!("sendgrid transient status {status}")))
        } else {
            Err(PipelineError::terminal(format!("sendgrid rejected message: {status}")))
        }
    }
}
