//! Time-slot events and their availability status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EventId, UserId};
use crate::error::SwapError;

/// Longest accepted title, in characters.
pub const MAX_TITLE_LEN: usize = 255;

/// Availability of an event for exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Not offered for exchange.
    Busy,
    /// Offered for exchange; other users may request it.
    Swappable,
    /// Committed to exactly one pending swap request.
    SwapPending,
}

impl EventStatus {
    /// Returns the wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Busy => "BUSY",
            Self::Swappable => "SWAPPABLE",
            Self::SwapPending => "SWAP_PENDING",
        }
    }

    /// Returns `true` for the statuses an owner may set directly.
    #[must_use]
    pub const fn is_owner_settable(self) -> bool {
        matches!(self, Self::Busy | Self::Swappable)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-owned time slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Event {
    /// Store-assigned identifier.
    pub id: EventId,
    /// Non-empty, trimmed title.
    pub title: String,
    /// Slot start (inclusive).
    pub start_time: DateTime<Utc>,
    /// Slot end; always after `start_time`.
    pub end_time: DateTime<Utc>,
    /// Current availability.
    pub status: EventStatus,
    /// Current owner.
    pub owner_id: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Returns `true` if `user` currently owns the event.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == user
    }
}

/// Trims and checks an event title.
///
/// # Errors
///
/// Returns [`SwapError::Validation`] if the title is blank or longer than
/// [`MAX_TITLE_LEN`] characters.
pub fn normalize_title(title: &str) -> Result<String, SwapError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(SwapError::Validation("title must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(SwapError::Validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Checks that a time window is non-empty.
///
/// # Errors
///
/// Returns [`SwapError::Validation`] if `end_time` is not after `start_time`.
pub fn validate_window(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<(), SwapError> {
    if end_time <= start_time {
        return Err(SwapError::Validation(
            "end_time must be after start_time".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn status_serializes_screaming_snake() {
        let json = serde_json::to_string(&EventStatus::SwapPending).unwrap_or_default();
        assert_eq!(json, "\"SWAP_PENDING\"");

        let Ok(status) = serde_json::from_str::<EventStatus>("\"SWAPPABLE\"") else {
            panic!("deserialization failed");
        };
        assert_eq!(status, EventStatus::Swappable);
    }

    #[test]
    fn swap_pending_is_not_owner_settable() {
        assert!(EventStatus::Busy.is_owner_settable());
        assert!(EventStatus::Swappable.is_owner_settable());
        assert!(!EventStatus::SwapPending.is_owner_settable());
    }

    #[test]
    fn title_is_trimmed() {
        let Ok(title) = normalize_title("  Standup  ") else {
            panic!("valid title rejected");
        };
        assert_eq!(title, "Standup");
    }

    #[test]
    fn blank_title_is_rejected() {
        assert!(matches!(
            normalize_title("   "),
            Err(SwapError::Validation(_))
        ));
    }

    #[test]
    fn overlong_title_is_rejected() {
        let title = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(matches!(
            normalize_title(&title),
            Err(SwapError::Validation(_))
        ));
    }

    #[test]
    fn window_must_be_positive() {
        let start = Utc::now();
        assert!(validate_window(start, start + Duration::hours(1)).is_ok());
        assert!(validate_window(start, start).is_err());
        assert!(validate_window(start, start - Duration::minutes(1)).is_err());
    }
}
