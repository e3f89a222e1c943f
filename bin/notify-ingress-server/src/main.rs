//! Notification platform ingress: HTTP admission, status callbacks, and
//! health endpoints (§4.1, §6).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use notify_breaker::CircuitBreaker;
use notify_broker::{Publisher, Topology};
use notify_config::AppConfig;
use notify_directory::UserDirectoryClient;
use notify_ingress::{api::AppState, create_router, AuthConfig, IngressService, RateLimitConfig, RateLimiter};
use notify_store::Store;
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    notify_common::logging::init_logging("notify-ingress-server");

    let config = AppConfig::load()?;
    info!("starting notification ingress server");

    let store = Store::connect(&config.store.url).await?;

    let publisher = Publisher::connect(&config.broker.url, &config.broker.exchange, "notify-ingress").await?;
    let topology = Topology {
        exchange: config.broker.exchange.clone(),
        email_queue: config.broker.email_queue.clone(),
        email_priority_queue: config.broker.email_priority_queue.clone(),
        push_queue: config.broker.push_queue.clone(),
        push_priority_queue: config.broker.push_priority_queue.clone(),
        failed_queue: config.broker.failed_queue.clone(),
    };
    topology.declare(publisher.channel()).await?;

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

    let service = Arc::new(IngressService::new(
        store.clone(),
        directory,
        publisher,
        config.store.notification_ttl_secs,
        config.retry.max_retries,
    ));

    let rate_limiter = Arc::new(RateLimiter::new(
        store.clone(),
        RateLimitConfig {
            enabled: config.rate_limit.enabled,
            requests_per_minute: config.rate_limit.requests_per_minute,
        },
    ));

    let auth = Arc::new(AuthConfig {
        jwt_secret: config.auth.jwt_secret.clone(),
        jwt_algorithm: config.auth.jwt_algorithm.clone(),
        service_token: config.auth.service_token.clone(),
    });

    let metrics_handle = Arc::new(PrometheusBuilder::new().install_recorder()?);

    let state = AppState {
        service,
        auth,
        rate_limiter,
        metrics_handle,
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "ingress listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ingress shutdown complete");
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
