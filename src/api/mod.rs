//! REST API layer: route handlers, DTOs, identity extraction, and router
//! composition.
//!
//! Resource endpoints are mounted under `/api/v1`; health and admin
//! endpoints live at the root. With the `swagger-ui` feature the OpenAPI
//! document is served at `/api-docs/openapi.json` and the UI at
//! `/swagger-ui`.

pub mod dto;
pub mod handlers;
pub mod identity;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "slot-swapper",
        description = "Time-slot swap negotiation service. Callers are identified by the user id header set by the access gateway."
    ),
    paths(
        handlers::event::create_event,
        handlers::event::list_my_events,
        handlers::event::get_event,
        handlers::event::update_event,
        handlers::event::set_event_status,
        handlers::event::delete_event,
        handlers::event::list_swappable,
        handlers::swap::create_swap_request,
        handlers::swap::respond_to_swap_request,
        handlers::swap::get_swap_request,
        handlers::swap::list_incoming,
        handlers::swap::list_outgoing,
        handlers::system::health_handler,
        handlers::system::consistency_handler,
    ),
    components(schemas(
        crate::domain::Event,
        crate::domain::EventStatus,
        crate::domain::SwapRequest,
        crate::domain::SwapStatus,
        crate::service::SwapRequestView,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        dto::CreateEventRequest,
        dto::UpdateEventRequest,
        dto::SetEventStatusRequest,
        dto::EventListResponse,
        dto::CreateSwapRequest,
        dto::SwapResponseRequest,
        dto::SwapRequestListResponse,
        dto::PaginationMeta,
    )),
    tags(
        (name = "Events", description = "Personal time slots and their availability"),
        (name = "Swap Requests", description = "Negotiating slot exchanges"),
        (name = "System", description = "Health and diagnostics"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
