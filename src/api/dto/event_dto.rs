//! Event DTOs for create, update, availability, and list operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::{Event, EventStatus};

/// Request body for `POST /events`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    /// Event title (trimmed, 1..=255 characters).
    pub title: String,
    /// Start of the time slot.
    pub start_time: DateTime<Utc>,
    /// End of the time slot; must be after `start_time`.
    pub end_time: DateTime<Utc>,
}

/// Request body for `PATCH /events/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateEventRequest {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New start time.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// New end time.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// Request body for `PUT /events/{id}/status`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetEventStatusRequest {
    /// Target status: `BUSY` or `SWAPPABLE`.
    pub status: EventStatus,
    /// Apply only if the event currently has this status.
    #[serde(default)]
    pub expected_status: Option<EventStatus>,
}

/// Paginated list response for event listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventListResponse {
    /// Events on this page, in ascending id order.
    pub data: Vec<Event>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
