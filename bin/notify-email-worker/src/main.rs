//! Email channel delivery worker (§4.3): consumes the email queues,
//! renders templates, sends through SMTP or SendGrid, and posts status.

use std::sync::Arc;

use anyhow::{Context, Result};
use notify_breaker::CircuitBreaker;
use notify_broker::{AmqpConsumer, Publisher};
use notify_common::NotificationType;
use notify_config::AppConfig;
use notify_providers::{EmailProvider, SendGridEmailProvider, SmtpConfig, SmtpEmailProvider};
use notify_store::Store;
use notify_template::{TemplateEngine, TemplateRepository};
use notify_worker::{ChannelSender, ChannelWorker, RetryPolicy, StatusClient};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    notify_common::logging::init_logging("notify-email-worker");

    let config = AppConfig::load()?;
    info!("starting email worker");

    let store = Store::connect(&config.store.url).await?;

    let consumer = AmqpConsumer::connect(
        &config.broker.url,
        &config.broker.exchange,
        &[config.broker.email_queue.clone(), config.broker.email_priority_queue.clone()],
        config.broker.prefetch_count,
        "notify-email-worker",
    )
    .await?;
    let publisher = Publisher::connect(&config.broker.url, &config.broker.exchange, "notify-email-worker").await?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.db.url)
        .await
        .context("connect template database")?;
    let repo = TemplateRepository::new(pool);
    let templates = TemplateEngine::new(repo, store.clone(), config.template.default_language.clone());
    templates.migrate().await?;
    let templates = Arc::new(templates);

    let email_provider: Arc<dyn EmailProvider> = if !config.provider.smtp.host.is_empty() {
        Arc::new(SmtpEmailProvider::new(SmtpConfig {
            host: config.provider.smtp.host.clone(),
            port: config.provider.smtp.port,
            username: config.provider.smtp.username.clone(),
            password: config.provider.smtp.password.clone(),
            from_address: config.provider.smtp.from_address.clone(),
        })?)
    } else {
        Arc::new(SendGridEmailProvider::new(
            config.provider.sendgrid_api_key.clone(),
            config.provider.smtp.from_address.clone(),
        ))
    };

    let breaker = Arc::new(CircuitBreaker::new(
        config.circuit_breaker.email.failure_threshold,
        config.circuit_breaker.email.success_threshold,
        std::time::Duration::from_secs(config.circuit_breaker.email.recovery_timeout_secs),
    ));

    let status_client = Arc::new(StatusClient::new(
        config.ingress_base_url.clone(),
        format!("email-service:{}", config.auth.service_token),
    ));

    let worker = Arc::new(ChannelWorker {
        channel: NotificationType::Email,
        consumer,
        publisher,
        store: store.clone(),
        templates,
        directory: None,
        breaker,
        sender: ChannelSender::Email(email_provider),
        status_client,
        retry: RetryPolicy {
            base_delay_ms: config.retry.base_delay_ms,
            exponential_base: config.retry.exponential_base,
            max_delay_ms: config.retry.max_delay_ms,
        },
        notification_ttl_secs: config.store.notification_ttl_secs,
        idempotency_ttl_secs: config.store.idempotency_ttl_secs,
        prefetch_count: config.broker.prefetch_count as u32,
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(worker.run(shutdown_rx));

    shutdown_signal().await;
    info!("shutdown signal received, draining email worker");
    let _ = shutdown_tx.send(true);
    let _ = handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
