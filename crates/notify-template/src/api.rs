//! Template HTTP API (§6): the standalone surface workers call for
//! render requests, and the CRUD+versioning surface for managing
//! templates out of band (§4.6). Guarded by the same service-token
//! format ingress uses for its worker-facing endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use notify_common::{ApiResponse, VariableMap};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::engine::TemplateEngine;
use crate::error::TemplateError;
use crate::models::{NewTemplate, RenderedTemplate, TemplateRecord, TemplateUpdate};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TemplateEngine>,
    pub service_token: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct VersionQuery {
    pub version: Option<u32>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RenderRequest {
    pub template_code: String,
    #[serde(default)]
    pub variables: VariableMap,
    pub language: Option<String>,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Notification Platform Template API",
        version = "0.1.0",
        description = "Template CRUD, versioning and rendering, consumed by the delivery workers (§4.6)"
    ),
    paths(create_template, update_template, delete_template, get_template, render_template, health_handler),
    components(schemas(NewTemplate, TemplateUpdate, TemplateRecord, RenderedTemplate, RenderRequest)),
    tags(
        (name = "templates", description = "Template storage, versioning and rendering"),
        (name = "health", description = "Health probe"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/templates", post(create_template))
        .route("/templates/render", post(render_template))
        .route(
            "/templates/:code/:language",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_service));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health_handler))
        .merge(guarded)
        .with_state(state)
}

/// Validates `service-name:secret` the same way ingress's status-post
/// endpoints do (§6), since only workers call this surface.
async fn require_service(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match bearer {
        Some(token) if token == state.service_token => next.run(request).await,
        _ => (StatusCode::UNAUTHORIZED, "unauthorized").into_response(),
    }
}

fn error_response(err: TemplateError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body: ApiResponse<()> = ApiResponse::err("template_error", err.to_string());
    (status, Json(body)).into_response()
}

/// Create a new template at version 1.
#[utoipa::path(
    post,
    path = "/templates",
    tag = "templates",
    request_body = NewTemplate,
    responses(
        (status = 200, description = "Created", body = TemplateRecord),
        (status = 400, description = "Invalid placeholder syntax"),
        (status = 409, description = "An active version already exists")
    )
)]
async fn create_template(State(state): State<AppState>, Json(new_template): Json<NewTemplate>) -> Response {
    match state.engine.create(new_template).await {
        Ok(record) => (StatusCode::OK, Json(ApiResponse::ok(record))).into_response(),
        Err(e) => error_response(e),
    }
}

/// Deactivate the current active row and insert the next version.
#[utoipa::path(
    put,
    path = "/templates/{code}/{language}",
    tag = "templates",
    params(("code" = String, Path), ("language" = String, Path)),
    request_body = TemplateUpdate,
    responses(
        (status = 200, description = "Updated", body = TemplateRecord),
        (status = 400, description = "Invalid placeholder syntax"),
        (status = 404, description = "No active version to update")
    )
)]
async fn update_template(
    State(state): State<AppState>,
    Path((code, language)): Path<(String, String)>,
    Json(update): Json<TemplateUpdate>,
) -> Response {
    match state.engine.update(&code, &language, update).await {
        Ok(record) => (StatusCode::OK, Json(ApiResponse::ok(record))).into_response(),
        Err(e) => error_response(e),
    }
}

/// Soft-delete (deactivate) the active version.
#[utoipa::path(
    delete,
    path = "/templates/{code}/{language}",
    tag = "templates",
    params(("code" = String, Path), ("language" = String, Path)),
    responses((status = 200, description = "Deactivated"), (status = 404, description = "No active version"))
)]
async fn delete_template(State(state): State<AppState>, Path((code, language)): Path<(String, String)>) -> Response {
    match state.engine.delete(&code, &language).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::ok(()))).into_response(),
        Err(e) => error_response(e),
    }
}

/// Fetch the active (or a specific) version, cache-first.
#[utoipa::path(
    get,
    path = "/templates/{code}/{language}",
    tag = "templates",
    params(("code" = String, Path), ("language" = String, Path), VersionQuery),
    responses(
        (status = 200, description = "Template record", body = TemplateRecord),
        (status = 404, description = "Unknown template")
    )
)]
async fn get_template(
    State(state): State<AppState>,
    Path((code, language)): Path<(String, String)>,
    Query(query): Query<VersionQuery>,
) -> Response {
    match state.engine.get(&code, &language, query.version).await {
        Ok(record) => (StatusCode::OK, Json(ApiResponse::ok(record))).into_response(),
        Err(e) => error_response(e),
    }
}

/// Render a template against the supplied variables (§6 Template HTTP API).
#[utoipa::path(
    post,
    path = "/templates/render",
    tag = "templates",
    request_body = RenderRequest,
    responses(
        (status = 200, description = "Rendered subject/body", body = RenderedTemplate),
        (status = 404, description = "Unknown template code/language")
    )
)]
async fn render_template(State(state): State<AppState>, Json(request): Json<RenderRequest>) -> Response {
    match state
        .engine
        .render(&request.template_code, &request.variables, request.language.as_deref())
        .await
    {
        Ok(rendered) => (StatusCode::OK, Json(ApiResponse::ok(rendered))).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
struct HealthResponse {
    status: String,
}

/// Basic liveness summary.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP".to_string() })
}
