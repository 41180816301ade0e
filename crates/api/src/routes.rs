use std::time::Instant;

use axum::extract::{MatchedPath, State};
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use seadrift_domain::util::{format_ms_rfc3339, now_ms};

use crate::error::ApiError;
use crate::middleware as app_middleware;
use crate::observability;
use crate::state::AppState;
use crate::validation;

pub fn router(state: AppState) -> Router {
    let internal = Router::new()
        .route("/internal/matching/run", post(run_matching))
        .route("/internal/delivery/run", post(run_delivery))
        .route("/internal/emails/send", post(send_email))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::require_service_token,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .route("/webhooks/subscriptions", post(subscription_webhook))
        .merge(internal)
        .layer(app_middleware::timeout_layer())
        .layer(app_middleware::trace_layer())
        .layer(app_middleware::set_request_id_layer())
        .layer(app_middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(track_http_metrics))
        .with_state(state)
}

async fn track_http_metrics(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(req).await;

    observability::register_http_request(&method, &route, response.status(), started.elapsed());
    response
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.app_env.clone(),
    })
}

async fn render_metrics() -> Response {
    match observability::render_metrics() {
        Some(body) => body.into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// Matching trigger. Only a failed outbox read is fatal; per-entry failures
/// are absorbed by the sweep and the call still reports a 200.
async fn run_matching(State(state): State<AppState>) -> Response {
    match state.matching.process_outbox().await {
        Ok(report) => {
            observability::register_sweep("matching", "success");
            (
                StatusCode::OK,
                Json(json!({ "ok": true, "processed": report.processed })),
            )
                .into_response()
        }
        Err(err) => {
            observability::register_sweep("matching", "error");
            tracing::error!(error = %err, "matching sweep failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn run_delivery(State(state): State<AppState>) -> Response {
    match state.delivery.run().await {
        Ok(report) => {
            observability::register_sweep("delivery", "success");
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "stats": {
                        "checked": report.checked,
                        "delivered": report.delivered,
                        "errors": report.errors,
                    },
                    "timestamp": format_ms_rfc3339(now_ms()),
                })),
            )
                .into_response()
        }
        Err(err) => {
            observability::register_sweep("delivery", "error");
            tracing::error!(error = %err, "delivery sweep failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": err.to_string(),
                    "timestamp": format_ms_rfc3339(now_ms()),
                })),
            )
                .into_response()
        }
    }
}

async fn subscription_webhook(
    State(state): State<AppState>,
    Json(event): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let applied = state
        .entitlements
        .apply_subscription_event(&event)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "entitlement upsert failed");
            ApiError::Internal
        })?;

    if let Some(entitlement) = &applied {
        tracing::info!(user_id = %entitlement.user_id, tier = entitlement.tier.as_str(), "entitlement updated");
    }

    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize, Validate)]
struct SendEmailRequest {
    #[validate(email)]
    recipient_email: String,
    #[validate(length(min = 1, max = 200))]
    subject: String,
    #[validate(length(min = 1, max = 100_000))]
    html: String,
}

async fn send_email(
    State(state): State<AppState>,
    Json(payload): Json<SendEmailRequest>,
) -> Result<Json<Value>, ApiError> {
    validation::validate(&payload)?;

    state
        .email
        .send(&payload.recipient_email, &payload.subject, &payload.html)
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "email send failed");
            ApiError::Upstream(err.to_string())
        })?;

    Ok(Json(json!({ "ok": true })))
}
