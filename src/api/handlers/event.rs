//! Event handlers: create, list, get, update, availability, delete, and the
//! swappable-slot marketplace.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::dto::{
    CreateEventRequest, EventListResponse, PaginationParams, SetEventStatusRequest,
    UpdateEventRequest,
};
use crate::api::identity::Caller;
use crate::app_state::AppState;
use crate::domain::{Event, EventId};
use crate::error::{ErrorResponse, SwapError};

/// `POST /events` — Create a new event owned by the caller.
///
/// # Errors
///
/// Returns [`SwapError::Validation`] on a blank title or empty time window.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Create an event",
    description = "Creates a BUSY event owned by the caller.",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 400, description = "Invalid title or time window", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, SwapError> {
    let event = state
        .engine
        .create_event(caller, &req.title, req.start_time, req.end_time)
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// `GET /events` — List the caller's events.
///
/// # Errors
///
/// Returns [`SwapError::Unauthenticated`] without a caller identity.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    summary = "List my events",
    description = "Returns a paginated list of events owned by the caller, in ascending id order.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated event list", body = EventListResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
    )
)]
pub async fn list_my_events(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, SwapError> {
    let events = state.engine.list_my_events(caller).await?;
    let (data, pagination) = params.paginate(events);
    Ok(Json(EventListResponse { data, pagination }))
}

/// `GET /events/{id}` — Get a single event.
///
/// # Errors
///
/// Returns [`SwapError::EventNotFound`] if the event does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Get an event",
    params(
        ("id" = u64, Path, description = "Event id"),
    ),
    responses(
        (status = 200, description = "Event details", body = Event),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    Caller(_caller): Caller,
    Path(id): Path<EventId>,
) -> Result<impl IntoResponse, SwapError> {
    let event = state.engine.get_event(id).await?;
    Ok(Json(event))
}

/// `PATCH /events/{id}` — Change an event's title or time window.
///
/// # Errors
///
/// Returns [`SwapError`] on a missing event, a non-owner caller, a
/// `SWAP_PENDING` event, or invalid details.
#[utoipa::path(
    patch,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Update event details",
    description = "Updates the title and/or time window. Not allowed while the event is committed to a pending swap.",
    params(
        ("id" = u64, Path, description = "Event id"),
    ),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Updated event", body = Event),
        (status = 400, description = "Invalid title or time window", body = ErrorResponse),
        (status = 403, description = "Caller does not own the event", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Event is SWAP_PENDING", body = ErrorResponse),
    )
)]
pub async fn update_event(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<EventId>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<impl IntoResponse, SwapError> {
    let event = state
        .engine
        .update_event_details(caller, id, req.title.as_deref(), req.start_time, req.end_time)
        .await?;
    Ok(Json(event))
}

/// `PUT /events/{id}/status` — Toggle between `BUSY` and `SWAPPABLE`.
///
/// # Errors
///
/// Returns [`SwapError`] on a missing event, a non-owner caller, a
/// `SWAP_PENDING` event or target, or a stale `expected_status`.
#[utoipa::path(
    put,
    path = "/api/v1/events/{id}/status",
    tag = "Events",
    summary = "Set event availability",
    description = "Marks an event BUSY or SWAPPABLE. With `expected_status`, applies only if the event still has that status.",
    params(
        ("id" = u64, Path, description = "Event id"),
    ),
    request_body = SetEventStatusRequest,
    responses(
        (status = 200, description = "Updated event", body = Event),
        (status = 400, description = "SWAP_PENDING cannot be set directly", body = ErrorResponse),
        (status = 403, description = "Caller does not own the event", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Event is SWAP_PENDING or expected status is stale", body = ErrorResponse),
    )
)]
pub async fn set_event_status(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<EventId>,
    Json(req): Json<SetEventStatusRequest>,
) -> Result<impl IntoResponse, SwapError> {
    let event = state
        .engine
        .set_event_availability(caller, id, req.status, req.expected_status)
        .await?;
    Ok(Json(event))
}

/// `DELETE /events/{id}` — Delete an event.
///
/// # Errors
///
/// Returns [`SwapError::Conflict`] if the event is committed to a pending
/// swap.
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Delete an event",
    params(
        ("id" = u64, Path, description = "Event id"),
    ),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 403, description = "Caller does not own the event", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Event is SWAP_PENDING", body = ErrorResponse),
    )
)]
pub async fn delete_event(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<EventId>,
) -> Result<impl IntoResponse, SwapError> {
    state.engine.delete_event(caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /swappable-slots` — Browse other users' swappable events.
///
/// # Errors
///
/// Returns [`SwapError::Unauthenticated`] without a caller identity.
#[utoipa::path(
    get,
    path = "/api/v1/swappable-slots",
    tag = "Events",
    summary = "List swappable slots",
    description = "Returns SWAPPABLE events owned by anyone except the caller.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated event list", body = EventListResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
    )
)]
pub async fn list_swappable(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, SwapError> {
    let events = state.engine.list_swappable(caller).await?;
    let (data, pagination) = params.paginate(events);
    Ok(Json(EventListResponse { data, pagination }))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event).get(list_my_events))
        .route(
            "/events/{id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
        .route("/events/{id}/status", put(set_event_status))
        .route("/swappable-slots", get(list_swappable))
}
