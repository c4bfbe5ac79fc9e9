//! Swap requests and their negotiation status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EventId, SwapRequestId, UserId};

/// Negotiation status of a swap request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapStatus {
    /// Awaiting the responder's decision.
    Pending,
    /// The responder accepted; ownership has been exchanged.
    Accepted,
    /// The responder declined; both events were released.
    Rejected,
}

impl SwapStatus {
    /// Returns the wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Returns `true` once no further transition is permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposal to exchange the requester's event for the responder's event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SwapRequest {
    /// Store-assigned identifier.
    pub id: SwapRequestId,
    /// User who proposed the swap.
    pub requester_id: UserId,
    /// User who owns the requested event and decides.
    pub responder_id: UserId,
    /// Event offered by the requester.
    pub requester_event_id: EventId,
    /// Event wanted by the requester.
    pub responder_event_id: EventId,
    /// Current negotiation status.
    pub status: SwapStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set once when the request reaches a terminal status.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SwapRequest {
    /// Returns `true` if `user` is the requester or the responder.
    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.requester_id == user || self.responder_id == user
    }

    /// Returns `true` if `event` is either side of the request.
    #[must_use]
    pub fn references(&self, event: EventId) -> bool {
        self.requester_event_id == event || self.responder_event_id == event
    }

}
