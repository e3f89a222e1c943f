//! Standalone template service: CRUD, versioning, and rendering over
//! HTTP (§6 "Template HTTP API"), consumed by the email/push workers
//! instead of the in-process engine.

use std::sync::Arc;

use anyhow::{Context, Result};
use notify_config::AppConfig;
use notify_store::Store;
use notify_template::{api::AppState, create_router, TemplateEngine, TemplateRepository};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    notify_common::logging::init_logging("notify-template-server");

    let config = AppConfig::load()?;
    info!("starting template service");

    let store = Store::connect(&config.store.url).await?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.db.url)
        .await
        .context("connect template database")?;
    let repo = TemplateRepository::new(pool);
    let engine = TemplateEngine::new(repo, store, config.template.default_language.clone());
    engine.migrate().await?;

    let state = AppState {
        engine: Arc::new(engine),
        service_token: config.auth.service_token.clone(),
    };

    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.template_http.host, config.template_http.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "template service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("template service shutdown complete");
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
