//! Best-effort status post back to ingress (§4.3 step 6). A failure here
//! is logged but never undoes an otherwise-successful delivery.

use notify_common::{NotificationStatusUpdate, NotificationType};
use std::time::Duration;
use tracing::warn;

pub struct StatusClient {
    http: reqwest::Client,
    base_url: String,
    service_token: String,
}

impl StatusClient {
    pub fn new(base_url: impl Into<String>, service_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("reqwest client builds"),
            base_url: base_url.into(),
            service_token: service_token.into(),
        }
    }

    pub async fn post_status(&self, channel: NotificationType, update: &NotificationStatusUpdate) {
        let path = match channel {
            NotificationType::Email => "email",
            NotificationType::Push => "push",
        };
        let url = format!("{}/{path}/status", self.base_url);

        let result = self
            .http
            .post(&url)
            .bearer_auth(&self.service_token)
            .json(update)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(status = %response.status(), notification_id = %update.notification_id, "status post rejected");
            }
            Err(e) => {
                warn!(error = %e, notification_id = %update.notification_id, "status post failed");
            }
        }
    }
}
