//! System endpoints: health check and consistency audit.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::error::{ErrorResponse, SwapError};
use crate::service::ConsistencyReport;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"healthy"` when the server answers.
    status: String,
    /// Server time, RFC 3339.
    timestamp: String,
    /// Crate version.
    version: String,
    /// Number of live events.
    events: usize,
    /// Number of swap requests ever created.
    swap_requests: usize,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, current timestamp, and store sizes.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            events: state.engine.events().len().await,
            swap_requests: state.engine.requests().len().await,
        }),
    )
}

/// `GET /admin/consistency` — Cross-check events against pending requests.
///
/// # Errors
///
/// Returns [`SwapError::Conflict`] if the audit could not lock every record
/// in time.
#[utoipa::path(
    get,
    path = "/admin/consistency",
    tag = "System",
    summary = "Consistency audit",
    description = "Verifies that every SWAP_PENDING event is referenced by exactly one PENDING swap request and vice versa. Responds 500 when a violation is found.",
    responses(
        (status = 200, description = "All invariants hold", body = ConsistencyReport),
        (status = 409, description = "Records stayed locked past the lock timeout", body = ErrorResponse),
        (status = 500, description = "At least one invariant is violated", body = ConsistencyReport),
    )
)]
pub async fn consistency_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, SwapError> {
    let report = state.engine.audit().await?;
    let status = if report.is_consistent() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(report)))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/admin/consistency", get(consistency_handler))
}
