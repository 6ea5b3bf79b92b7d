use std::sync::Arc;

use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod sla;
pub mod workflow;

/// Envelope wrapped around every response body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            message: Some(message.into()),
        })
    }
}

/// Routes of the analytics API. The caller mounts this under
/// `/workflow-analytics`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/metrics", get(workflow::get_metrics))
        .route("/sla/active", get(sla::list_active))
        .route("/sla/breached", get(sla::list_breached))
        .route("/sla/warnings", get(sla::list_warnings))
        .route(
            "/sla/policies",
            get(sla::list_policies).post(sla::define_policy),
        )
        .route("/sla/track", post(sla::start_tracking))
        .route(
            "/sla/tracking/:approval_id/:step",
            get(sla::get_status).delete(sla::stop_tracking),
        )
        .route(
            "/sla/tracking/:approval_id/:step/escalations",
            get(sla::check_escalation),
        )
        .route("/workflow", post(workflow::start_workflow))
        .route("/workflow/:id", get(workflow::get_workflow))
        .route(
            "/workflow/:id/steps/:step/complete",
            post(workflow::complete_step),
        )
        .route("/workflow/:id/complete", post(workflow::complete_workflow))
        .route("/cleanup", post(workflow::cleanup))
}

/// Full application router: health checks, the analytics API and the
/// response middleware stack. CORS and body limits are added by `main`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .nest("/workflow-analytics", api_router())
        .fallback(fallback_404)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

async fn readiness_check() -> &'static str {
    "ok"
}

async fn fallback_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "success": false, "message": "route not found" })),
    )
}

/// Middleware: injects a unique X-Request-Id into every response so clients
/// can correlate errors with service logs.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: security headers on every response.
async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    // Status values are derived per request.
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.remove("Server");

    resp
}
