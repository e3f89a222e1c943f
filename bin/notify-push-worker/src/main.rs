//! Push channel delivery worker (§4.3): consumes the push queues,
//! re-resolves the device token, renders templates, sends through FCM,
//! and posts status.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify_breaker::CircuitBreaker;
use notify_broker::{AmqpConsumer, Publisher};
use notify_common::NotificationType;
use notify_config::AppConfig;
use notify_directory::UserDirectoryClient;
use notify_providers::FcmPushProvider;
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
    notify_common::logging::init_logging("notify-push-worker");

    let config = AppConfig::load()?;
    info!("starting push worker");

    let store = Store::connect(&config.store.url).await?;

    let consumer = AmqpConsumer::connect(
        &config.broker.url,
        &config.broker.exchange,
        &[config.broker.push_queue.clone(), config.broker.push_priority_queue.clone()],
        config.broker.prefetch_count,
        "notify-push-worker",
    )
    .await?;
    let publisher = Publisher::connect(&config.broker.url, &config.broker.exchange, "notify-push-worker").await?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.db.url)
        .await
        .context("connect template database")?;
    let repo = TemplateRepository::new(pool);
    let templates = TemplateEngine::new(repo, store.clone(), config.template.default_language.clone());
    templates.migrate().await?;
    let templates = Arc::new(templates);

    let directory_breaker = Arc::new(CircuitBreaker::new(
        config.circuit_breaker.user_directory.failure_threshold,
        config.circuit_breaker.user_directory.success_threshold,
        Duration::from_secs(config.circuit_breaker.user_directory.recovery_timeout_secs),
    ));
    let directory = Arc::new(UserDirectoryClient::new(
        config.provider.user_directory_url.clone(),
        Duration::from_secs(5),
        store.clone(),
        directory_breaker,
    )?);

    let push_provider = Arc::new(FcmPushProvider::new(config.provider.fcm_api_key.clone()));

    let breaker = Arc::new(CircuitBreaker::new(
        config.circuit_breaker.push.failure_threshold,
        config.circuit_breaker.push.success_threshold,
        Duration::from_secs(config.circuit_breaker.push.recovery_timeout_secs),
    ));

    let status_client = Arc::new(StatusClient::new(
        config.ingress_base_url.clone(),
        format!("push-service:{}", config.auth.service_token),
    ));

    let worker = Arc::new(ChannelWorker {
        channel: NotificationType::Push,
        consumer,
        publisher,
        store: store.clone(),
        templates,
        directory: Some(directory),
        breaker,
        sender: ChannelSender::Push(push_provider),
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
    info!("shutdown signal received, draining push worker");
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
