//! Domain events emitted after every committed transition.
//!
//! The negotiation engine publishes a [`NegotiationEvent`] through the
//! [`super::EventBus`] once a transition has committed. The optional
//! persistence layer appends them to the PostgreSQL negotiation log.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{EventId, EventStatus, SwapRequestId, UserId};

/// Domain event describing one committed state change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum NegotiationEvent {
    /// A new event was created.
    EventCreated {
        /// Created event.
        event_id: EventId,
        /// Owner of the new event.
        owner_id: UserId,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An event's title or time window changed.
    EventUpdated {
        /// Updated event.
        event_id: EventId,
        /// Owner performing the update.
        owner_id: UserId,
        /// Update timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An owner toggled an event's availability.
    EventStatusChanged {
        /// Affected event.
        event_id: EventId,
        /// Status before the change.
        old_status: EventStatus,
        /// Status after the change.
        new_status: EventStatus,
        /// Change timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An event was deleted by its owner.
    EventDeleted {
        /// Deleted event.
        event_id: EventId,
        /// Owner at deletion time.
        owner_id: UserId,
        /// Deletion timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A swap request was created and both events became `SWAP_PENDING`.
    SwapRequested {
        /// New request.
        request_id: SwapRequestId,
        /// Requesting user.
        requester_id: UserId,
        /// Responding user.
        responder_id: UserId,
        /// Event offered by the requester.
        requester_event_id: EventId,
        /// Event wanted by the requester.
        responder_event_id: EventId,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A swap request was accepted and ownership exchanged.
    SwapAccepted {
        /// Resolved request.
        request_id: SwapRequestId,
        /// Event now owned by the responder.
        requester_event_id: EventId,
        /// Event now owned by the requester.
        responder_event_id: EventId,
        /// Resolution timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A swap request was rejected and both events released.
    SwapRejected {
        /// Resolved request.
        request_id: SwapRequestId,
        /// Event released back to the requester.
        requester_event_id: EventId,
        /// Event released back to the responder.
        responder_event_id: EventId,
        /// Resolution timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl NegotiationEvent {
    /// Returns the id of the aggregate the event belongs to: the swap
    /// request for swap events, the event otherwise.
    #[must_use]
    pub fn aggregate_id(&self) -> u64 {
        match self {
            Self::EventCreated { event_id, .. }
            | Self::EventUpdated { event_id, .. }
            | Self::EventStatusChanged { event_id, .. }
            | Self::EventDeleted { event_id, .. } => event_id.get(),
            Self::SwapRequested { request_id, .. }
            | Self::SwapAccepted { request_id, .. }
            | Self::SwapRejected { request_id, .. } => request_id.get(),
        }
    }

    /// Returns the aggregate kind: `"event"` or `"swap_request"`.
    #[must_use]
    pub const fn aggregate_kind(&self) -> &'static str {
        match self {
            Self::EventCreated { .. }
            | Self::EventUpdated { .. }
            | Self::EventStatusChanged { .. }
            | Self::EventDeleted { .. } => "event",
            Self::SwapRequested { .. } | Self::SwapAccepted { .. } | Self::SwapRejected { .. } => {
                "swap_request"
            }
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::EventCreated { .. } => "event_created",
            Self::EventUpdated { .. } => "event_updated",
            Self::EventStatusChanged { .. } => "event_status_changed",
            Self::EventDeleted { .. } => "event_deleted",
            Self::SwapRequested { .. } => "swap_requested",
            Self::SwapAccepted { .. } => "swap_accepted",
            Self::SwapRejected { .. } => "swap_rejected",
        }
    }

    /// Returns when the change committed.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::EventCreated { timestamp, .. }
            | Self::EventUpdated { timestamp, .. }
            | Self::EventStatusChanged { timestamp, .. }
            | Self::EventDeleted { timestamp, .. }
            | Self::SwapRequested { timestamp, .. }
            | Self::SwapAccepted { timestamp, .. }
            | Self::SwapRejected { timestamp, .. } => *timestamp,
        }
    }
}
