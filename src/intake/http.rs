//! HTTP surface: the webhook intake route plus health/readiness (§4.1,
//! §10.4).

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::{debug, error};

use crate::domain::PipelineError;
use crate::observability::{extract_trace_context_from_headers, HealthChecker, HealthStatus};

use super::handler::{IntakeHandler, IntakeOutcome};

#[derive(Clone)]
pub struct IntakeState {
    pub handler: Arc<IntakeHandler>,
    pub health: Arc<HealthChecker>,
}

pub fn router(state: IntakeState) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(readiness_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO)))
                .layer(CorsLayer::permissive()),
        )
}

/// Zoom's webhook secret is carried in the `Authorization` header verbatim,
/// not HMAC-signed; when `webhook.secret` is unset, any caller is accepted.
async fn webhook_handler(
    State(state): State<IntakeState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> std::result::Result<Response, IntakeHttpError> {
    let trace_ctx = extract_trace_context_from_headers(&headers).unwrap_or_default();
    debug!(correlation_id = %trace_ctx.correlation_id, request_id = %trace_ctx.request_id, "received webhook call");

    if let Some(expected) = state.handler.webhook_secret() {
        let provided = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or("");
        if provided != expected {
            return Err(IntakeHttpError(PipelineError::BadWebhookData("invalid webhook secret".into())));
        }
    }

    match state.handler.handle_webhook(payload).await {
        Ok(IntakeOutcome::Created { ingest_id, uuid }) => {
            Ok(Json(json!({ "status": "created", "ingest_id": ingest_id, "uuid": uuid, "message": format!("Successfully sent {uuid}") })).into_response())
        }
        Ok(IntakeOutcome::AlreadyCreated { ingest_id, uuid }) => {
            Ok(Json(json!({ "status": "already created", "ingest_id": ingest_id, "uuid": uuid, "message": "already created" })).into_response())
        }
        Ok(IntakeOutcome::Filtered(reason)) => Ok(Json(json!({ "status": "filtered", "reason": reason, "message": "dropped by filter" })).into_response()),
        Ok(IntakeOutcome::TooShort(reason)) => {
            Ok((StatusCode::BAD_REQUEST, Json(json!({ "status": "too short", "reason": reason, "message": "too short" }))).into_response())
        }
        Ok(IntakeOutcome::Disabled) => Ok((
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({ "status": "disabled", "message": "webhook ingest is disabled" })),
        )
            .into_response()),
        Ok(IntakeOutcome::Ignored(event)) => Ok(Json(json!({ "status": "ignored", "event": event, "message": "unknown event" })).into_response()),
        Err(e) => Err(IntakeHttpError(e)),
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "version": crate::VERSION }))
}

async fn readiness_handler(State(state): State<IntakeState>) -> impl IntoResponse {
    let health = state.health.check_readiness().await;
    let status = match health {
        HealthStatus::Healthy => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(json!({ "status": health.to_string() })))
}

struct IntakeHttpError(PipelineError);

impl IntoResponse for IntakeHttpError {
    fn into_response(self) -> Response {
        crate::observability::metrics::record_error(self.0.taxonomy());
        let status = match &self.0 {
            PipelineError::BadWebhookData(_) | PipelineError::NoMp4Files(_) => StatusCode::BAD_REQUEST,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(error = %self.0, "webhook handling failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
