//! Database models for the negotiation log.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::NegotiationEvent;
use crate::error::SwapError;

/// A row ready to be appended to `negotiation_log`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLogEntry {
    /// Idempotency key; re-appending the same entry is a no-op.
    pub entry_id: Uuid,
    /// `"event"` or `"swap_request"`.
    pub aggregate_kind: &'static str,
    /// Id of the event or swap request.
    pub aggregate_id: i64,
    /// Event type discriminator (e.g. `"swap_accepted"`).
    pub event_type: &'static str,
    /// Full serialized event.
    pub payload: serde_json::Value,
    /// When the transition committed.
    pub occurred_at: DateTime<Utc>,
}

impl NewLogEntry {
    /// Builds a log row from a committed negotiation event.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Internal`] if the event cannot be serialized or
    /// its aggregate id does not fit a `BIGINT`.
    pub fn from_event(event: &NegotiationEvent) -> Result<Self, SwapError> {
        let payload = serde_json::to_value(event)
            .map_err(|e| SwapError::Internal(format!("cannot serialize event: {e}")))?;
        let aggregate_id = i64::try_from(event.aggregate_id()).map_err(|_| {
            SwapError::Internal(format!("aggregate id {} overflows BIGINT", event.aggregate_id()))
        })?;

        Ok(Self {
            entry_id: Uuid::new_v4(),
            aggregate_kind: event.aggregate_kind(),
            aggregate_id,
            event_type: event.event_type_str(),
            payload,
            occurred_at: event.timestamp(),
        })
    }
}
