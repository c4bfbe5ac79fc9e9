//! Swap request DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::EventId;
use crate::service::SwapRequestView;

/// Request body for `POST /swap-requests`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSwapRequest {
    /// Event the caller offers.
    #[serde(alias = "my_slot_id")]
    pub my_event_id: EventId,
    /// Event the caller wants in exchange.
    #[serde(alias = "their_slot_id")]
    pub their_event_id: EventId,
}

/// Request body for `POST /swap-requests/{id}/response`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SwapResponseRequest {
    /// `true` to accept the swap, `false` to reject it.
    pub accepted: bool,
}

/// Paginated list response for incoming and outgoing requests.
#[derive(Debug, Serialize, ToSchema)]
pub struct SwapRequestListResponse {
    /// Requests on this page, in ascending id order, each with both events.
    pub data: Vec<SwapRequestView>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
