//! Swap request handlers: request, respond, and inspect negotiations.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CreateSwapRequest, PaginationParams, SwapRequestListResponse, SwapResponseRequest,
};
use crate::api::identity::Caller;
use crate::app_state::AppState;
use crate::domain::{SwapRequest, SwapRequestId};
use crate::error::{ErrorResponse, SwapError};

/// `POST /swap-requests` — Offer one of the caller's events for another.
///
/// # Errors
///
/// Returns [`SwapError::InvalidSwap`] for ownership or availability
/// violations and [`SwapError::Conflict`] if either event is already
/// committed to another swap.
#[utoipa::path(
    post,
    path = "/api/v1/swap-requests",
    tag = "Swap Requests",
    summary = "Request a swap",
    description = "Atomically marks both events SWAP_PENDING and creates a PENDING swap request addressed to the owner of the wanted event.",
    request_body = CreateSwapRequest,
    responses(
        (status = 201, description = "Swap request created", body = SwapRequest),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Event already committed to another swap", body = ErrorResponse),
        (status = 422, description = "Swap not allowed", body = ErrorResponse),
    )
)]
pub async fn create_swap_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<CreateSwapRequest>,
) -> Result<impl IntoResponse, SwapError> {
    let request = state
        .engine
        .request_swap(caller, req.my_event_id, req.their_event_id)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// `POST /swap-requests/{id}/response` — Accept or reject a swap.
///
/// # Errors
///
/// Returns [`SwapError`] if the request is missing, the caller is not its
/// responder, or it is already resolved.
#[utoipa::path(
    post,
    path = "/api/v1/swap-requests/{id}/response",
    tag = "Swap Requests",
    summary = "Respond to a swap request",
    description = "Accepting exchanges the owners of both events; rejecting releases them. Both leave the events SWAPPABLE.",
    params(
        ("id" = u64, Path, description = "Swap request id"),
    ),
    request_body = SwapResponseRequest,
    responses(
        (status = 200, description = "Resolved swap request", body = SwapRequest),
        (status = 403, description = "Caller is not the responder", body = ErrorResponse),
        (status = 404, description = "Swap request not found", body = ErrorResponse),
        (status = 409, description = "Swap request already resolved", body = ErrorResponse),
    )
)]
pub async fn respond_to_swap_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<SwapRequestId>,
    Json(req): Json<SwapResponseRequest>,
) -> Result<impl IntoResponse, SwapError> {
    let request = state
        .engine
        .respond_to_swap(caller, id, req.accepted)
        .await?;
    Ok(Json(request))
}

/// `GET /swap-requests/{id}` — Get a swap request the caller takes part in.
///
/// # Errors
///
/// Returns [`SwapError::SwapRequestNotFound`] or [`SwapError::Forbidden`].
#[utoipa::path(
    get,
    path = "/api/v1/swap-requests/{id}",
    tag = "Swap Requests",
    summary = "Get a swap request",
    params(
        ("id" = u64, Path, description = "Swap request id"),
    ),
    responses(
        (status = 200, description = "Swap request", body = SwapRequest),
        (status = 403, description = "Caller is not a participant", body = ErrorResponse),
        (status = 404, description = "Swap request not found", body = ErrorResponse),
    )
)]
pub async fn get_swap_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<SwapRequestId>,
) -> Result<impl IntoResponse, SwapError> {
    let request = state.engine.get_swap_request(caller, id).await?;
    Ok(Json(request))
}

/// `GET /swap-requests/incoming` — Requests addressed to the caller.
///
/// # Errors
///
/// Returns [`SwapError::Unauthenticated`] without a caller identity.
#[utoipa::path(
    get,
    path = "/api/v1/swap-requests/incoming",
    tag = "Swap Requests",
    summary = "List incoming swap requests",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated request list", body = SwapRequestListResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
    )
)]
pub async fn list_incoming(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, SwapError> {
    let requests = state.engine.list_incoming(caller).await?;
    let (data, pagination) = params.paginate(requests);
    Ok(Json(SwapRequestListResponse { data, pagination }))
}

/// `GET /swap-requests/outgoing` — Requests made by the caller.
///
/// # Errors
///
/// Returns [`SwapError::Unauthenticated`] without a caller identity.
#[utoipa::path(
    get,
    path = "/api/v1/swap-requests/outgoing",
    tag = "Swap Requests",
    summary = "List outgoing swap requests",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated request list", body = SwapRequestListResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
    )
)]
pub async fn list_outgoing(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, SwapError> {
    let requests = state.engine.list_outgoing(caller).await?;
    let (data, pagination) = params.paginate(requests);
    Ok(Json(SwapRequestListResponse { data, pagination }))
}

/// Swap request routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/swap-requests", post(create_swap_request))
        .route("/swap-requests/incoming", get(list_incoming))
        .route("/swap-requests/outgoing", get(list_outgoing))
        .route("/swap-requests/{id}", get(get_swap_request))
        .route("/swap-requests/{id}/response", post(respond_to_swap_request))
}
