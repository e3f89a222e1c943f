//! HTTP surface (§6): axum router, OpenAPI docs, and handlers. Auth and
//! rate limiting are applied as middleware/guards in front of the
//! admission pipeline in [`crate::service`].

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use notify_common::{
    ApiResponse, NotificationRecord, NotificationRequest, NotificationStatusUpdate, PaginationMeta,
    SubmitResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{self, AuthConfig, Principal};
use crate::middleware::{correlation_id, CorrelationId};
use crate::rate_limit::RateLimiter;
use crate::service::IngressService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IngressService>,
    pub auth: Arc<AuthConfig>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics_handle: Arc<PrometheusHandle>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationRecord>,
    pub meta: PaginationMeta,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Notification Platform Ingress API",
        version = "0.1.0",
        description = "Admission, status, and health endpoints for the notification delivery platform"
    ),
    paths(
        submit_notification,
        get_notification,
        list_notifications,
        post_email_status,
        post_push_status,
        health_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(schemas(
        NotificationRequest,
        SubmitResponse,
        NotificationRecord,
        NotificationStatusUpdate,
        PaginationMeta,
        NotificationListResponse,
        HealthResponse,
    )),
    tags(
        (name = "notifications", description = "Notification submission and lookup"),
        (name = "status", description = "Worker status callbacks"),
        (name = "health", description = "Health and readiness probes"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    let notifications_guarded = Router::new()
        .route("/notifications", post(submit_notification))
        .route("/notifications/:id", get(get_notification))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth::require_user_or_key));

    let listing_guarded = Router::new()
        .route("/notifications", get(list_notifications))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth::require_user));

    let status_guarded = Router::new()
        .route("/email/status", post(post_email_status))
        .route("/push/status", post(post_push_status))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth::require_service));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .merge(notifications_guarded)
        .merge(listing_guarded)
        .merge(status_guarded)
        .layer(axum::middleware::from_fn(correlation_id))
        .with_state(state)
}

fn error_response(err: crate::error::IngressError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let retry_after = match &err {
        crate::error::IngressError::Platform(notify_common::PlatformError::RateLimitExceeded {
            retry_after_secs,
        }) => Some(*retry_after_secs),
        _ => None,
    };
    let body: ApiResponse<()> = ApiResponse::err(err.kind(), err.to_string());
    let mut response = (status, Json(body)).into_response();
    if let Some(retry_after_secs) = retry_after {
        if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after_secs.to_string()) {
            response.headers_mut().insert("retry-after", value);
        }
    }
    response
}

/// Submit a notification for delivery.
#[utoipa::path(
    post,
    path = "/notifications",
    tag = "notifications",
    request_body = NotificationRequest,
    responses(
        (status = 200, description = "Accepted", body = SubmitResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Authentication error"),
        (status = 403, description = "Blocked by recipient preference"),
        (status = 429, description = "Rate limited"),
        (status = 503, description = "Dependency unavailable")
    )
)]
async fn submit_notification(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(correlation_id): Extension<CorrelationId>,
    Json(payload): Json<NotificationRequest>,
) -> Response {
    if let Err(retry_after_secs) = state.rate_limiter.check(&principal.rate_limit_key()).await {
        return error_response(crate::error::IngressError::Platform(
            notify_common::PlatformError::RateLimitExceeded { retry_after_secs },
        ));
    }

    match state.service.submit(payload, &correlation_id.0).await {
        Ok(resp) => (StatusCode::OK, Json(ApiResponse::ok(resp))).into_response(),
        Err(e) => error_response(e),
    }
}

/// Look up a single notification by id.
#[utoipa::path(
    get,
    path = "/notifications/{id}",
    tag = "notifications",
    params(("id" = String, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification record", body = NotificationRecord),
        (status = 404, description = "Unknown notification")
    )
)]
async fn get_notification(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.service.get_notification(&id).await {
        Ok(record) => (StatusCode::OK, Json(ApiResponse::ok(record))).into_response(),
        Err(e) => error_response(e),
    }
}

/// Page through a user's notification history.
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of notifications", body = NotificationListResponse)
    )
)]
async fn list_notifications(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<PageQuery>,
) -> Response {
    let user_id = match principal {
        Principal::User(sub) => sub,
        _ => {
            return error_response(crate::error::IngressError::Platform(
                notify_common::PlatformError::Authentication("listing requires a JWT".to_string()),
            ))
        }
    };

    match state
        .service
        .list_notifications(&user_id, query.page, query.limit)
        .await
    {
        Ok((notifications, meta)) => (
            StatusCode::OK,
            Json(ApiResponse::ok_with_meta(
                NotificationListResponse { notifications, meta: meta.clone() },
                meta,
            )),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Record a terminal delivery status reported by the email worker.
#[utoipa::path(
    post,
    path = "/email/status",
    tag = "status",
    request_body = NotificationStatusUpdate,
    responses(
        (status = 200, description = "Updated record", body = NotificationRecord),
        (status = 401, description = "Invalid service token"),
        (status = 404, description = "Unknown notification")
    )
)]
async fn post_email_status(State(state): State<AppState>, Json(update): Json<NotificationStatusUpdate>) -> Response {
    apply_status(&state, update).await
}

/// Record a terminal delivery status reported by the push worker.
#[utoipa::path(
    post,
    path = "/push/status",
    tag = "status",
    request_body = NotificationStatusUpdate,
    responses(
        (status = 200, description = "Updated record", body = NotificationRecord),
        (status = 401, description = "Invalid service token"),
        (status = 404, description = "Unknown notification")
    )
)]
async fn post_push_status(State(state): State<AppState>, Json(update): Json<NotificationStatusUpdate>) -> Response {
    apply_status(&state, update).await
}

async fn apply_status(state: &AppState, update: NotificationStatusUpdate) -> Response {
    match state.service.apply_status_update(&update).await {
        Ok(record) => (StatusCode::OK, Json(ApiResponse::ok(record))).into_response(),
        Err(e) => error_response(e),
    }
}

/// Basic liveness/health summary.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP".to_string() })
}

/// Kubernetes liveness probe.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses((status = 200, description = "Process is alive", body = HealthResponse))
)]
async fn liveness_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "LIVE".to_string() })
}

/// Kubernetes readiness probe: checks the KV store is reachable.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready to accept traffic", body = HealthResponse),
        (status = 503, description = "Dependency unavailable", body = HealthResponse)
    )
)]
async fn readiness_handler(State(state): State<AppState>) -> Response {
    match state.service.ping_dependencies().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "READY".to_string() })).into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse { status: "NOT_READY".to_string() }),
        )
            .into_response(),
    }
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics_handle.render(),
    )
        .into_response()
}
