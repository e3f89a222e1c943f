//! Configuration loader with file and environment variable support.

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths, checked in order.
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "./config/config.toml",
    "/etc/notify/config.toml",
];

pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path.
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        self.apply_env_overrides(&mut config);

        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var("NOTIFY_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    fn apply_env_overrides(&self, config: &mut AppConfig) {
        if let Ok(val) = env::var("NOTIFY_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                config.http.port = port;
            }
        }
        if let Ok(val) = env::var("NOTIFY_HTTP_HOST") {
            config.http.host = val;
        }
        if let Ok(val) = env::var("NOTIFY_CORS_ORIGINS") {
            config.http.cors_origins = val.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Ok(val) = env::var("NOTIFY_TEMPLATE_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                config.template_http.port = port;
            }
        }
        if let Ok(val) = env::var("NOTIFY_TEMPLATE_HTTP_HOST") {
            config.template_http.host = val;
        }

        if let Ok(val) = env::var("NOTIFY_BROKER_URL") {
            config.broker.url = val;
        }
        if let Ok(val) = env::var("NOTIFY_BROKER_EXCHANGE") {
            config.broker.exchange = val;
        }
        if let Ok(val) = env::var("NOTIFY_BROKER_EMAIL_QUEUE") {
            config.broker.email_queue = val;
        }
        if let Ok(val) = env::var("NOTIFY_BROKER_EMAIL_PRIORITY_QUEUE") {
            config.broker.email_priority_queue = val;
        }
        if let Ok(val) = env::var("NOTIFY_BROKER_PUSH_QUEUE") {
            config.broker.push_queue = val;
        }
        if let Ok(val) = env::var("NOTIFY_BROKER_PUSH_PRIORITY_QUEUE") {
            config.broker.push_priority_queue = val;
        }
        if let Ok(val) = env::var("NOTIFY_BROKER_FAILED_QUEUE") {
            config.broker.failed_queue = val;
        }
        if let Ok(val) = env::var("NOTIFY_BROKER_PREFETCH_COUNT") {
            if let Ok(count) = val.parse() {
                config.broker.prefetch_count = count;
            }
        }

        if let Ok(val) = env::var("NOTIFY_STORE_URL") {
            config.store.url = val;
        }
        if let Ok(val) = env::var("NOTIFY_STORE_NOTIFICATION_TTL_SECS") {
            if let Ok(ttl) = val.parse() {
                config.store.notification_ttl_secs = ttl;
            }
        }
        if let Ok(val) = env::var("NOTIFY_STORE_IDEMPOTENCY_TTL_SECS") {
            if let Ok(ttl) = val.parse() {
                config.store.idempotency_ttl_secs = ttl;
            }
        }

        if let Ok(val) = env::var("NOTIFY_DB_URL") {
            config.db.url = val;
        }

        if let Ok(val) = env::var("NOTIFY_RATE_LIMIT_ENABLED") {
            config.rate_limit.enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = env::var("NOTIFY_RATE_LIMIT_PER_MINUTE") {
            if let Ok(rpm) = val.parse() {
                config.rate_limit.requests_per_minute = rpm;
            }
        }

        if let Ok(val) = env::var("NOTIFY_CB_EMAIL_FAILURE_THRESHOLD") {
            if let Ok(v) = val.parse() {
                config.circuit_breaker.email.failure_threshold = v;
            }
        }
        if let Ok(val) = env::var("NOTIFY_CB_EMAIL_RECOVERY_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.circuit_breaker.email.recovery_timeout_secs = v;
            }
        }
        if let Ok(val) = env::var("NOTIFY_CB_PUSH_FAILURE_THRESHOLD") {
            if let Ok(v) = val.parse() {
                config.circuit_breaker.push.failure_threshold = v;
            }
        }
        if let Ok(val) = env::var("NOTIFY_CB_PUSH_RECOVERY_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.circuit_breaker.push.recovery_timeout_secs = v;
            }
        }

        if let Ok(val) = env::var("NOTIFY_RETRY_MAX_RETRIES") {
            if let Ok(v) = val.parse() {
                config.retry.max_retries = v;
            }
        }
        if let Ok(val) = env::var("NOTIFY_RETRY_BASE_DELAY_MS") {
            if let Ok(v) = val.parse() {
                config.retry.base_delay_ms = v;
            }
        }
        if let Ok(val) = env::var("NOTIFY_RETRY_EXPONENTIAL_BASE") {
            if let Ok(v) = val.parse() {
                config.retry.exponential_base = v;
            }
        }
        if let Ok(val) = env::var("NOTIFY_RETRY_MAX_DELAY_MS") {
            if let Ok(v) = val.parse() {
                config.retry.max_delay_ms = v;
            }
        }

        if let Ok(val) = env::var("NOTIFY_SMTP_HOST") {
            config.provider.smtp.host = val;
        }
        if let Ok(val) = env::var("NOTIFY_SMTP_PORT") {
            if let Ok(v) = val.parse() {
                config.provider.smtp.port = v;
            }
        }
        if let Ok(val) = env::var("NOTIFY_SMTP_USERNAME") {
            config.provider.smtp.username = val;
        }
        if let Ok(val) = env::var("NOTIFY_SMTP_PASSWORD") {
            config.provider.smtp.password = val;
        }
        if let Ok(val) = env::var("NOTIFY_SMTP_FROM_ADDRESS") {
            config.provider.smtp.from_address = val;
        }
        if let Ok(val) = env::var("NOTIFY_SENDGRID_API_KEY") {
            config.provider.sendgrid_api_key = val;
        }
        if let Ok(val) = env::var("NOTIFY_FCM_API_KEY") {
            config.provider.fcm_api_key = val;
        }
        if let Ok(val) = env::var("NOTIFY_USER_DIRECTORY_URL") {
            config.provider.user_directory_url = val;
        }

        if let Ok(val) = env::var("NOTIFY_TEMPLATE_DEFAULT_LANGUAGE") {
            config.template.default_language = val;
        }
        if let Ok(val) = env::var("NOTIFY_TEMPLATE_SUPPORTED_LANGUAGES") {
            config.template.supported_languages =
                val.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Ok(val) = env::var("NOTIFY_JWT_SECRET") {
            config.auth.jwt_secret = val;
        }
        if let Ok(val) = env::var("NOTIFY_JWT_ALGORITHM") {
            config.auth.jwt_algorithm = val;
        }
        if let Ok(val) = env::var("NOTIFY_SERVICE_TOKEN") {
            config.auth.service_token = val;
        }

        if let Ok(val) = env::var("NOTIFY_DEV_MODE") {
            config.dev_mode = val.parse().unwrap_or(false);
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_path_overrides_search_paths() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[broker]\nexchange = \"custom.exchange\"\n").unwrap();

        let loader = ConfigLoader::with_path(file.path());
        let config = loader.load().unwrap();
        assert_eq!(config.broker.exchange, "custom.exchange");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let loader = ConfigLoader::with_path("/nonexistent/path/config.toml");
        let config = loader.load().unwrap();
        assert_eq!(config.broker.exchange, "notify.direct");
    }
}
