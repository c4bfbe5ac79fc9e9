//! Error types with HTTP status code mapping.
//!
//! [`SwapError`] is the single error type returned by the stores, the
//! negotiation engine, and the HTTP handlers. Each variant maps to a numeric
//! code and an HTTP status, and tells the caller whether retrying the whole
//! user action can succeed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{EventId, SwapRequestId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2005,
///     "message": "conflict: event 4 is already committed to another swap",
///     "retryable": true
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`SwapError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Whether refreshing state and repeating the action may succeed.
    pub retryable: bool,
}

/// Error enum shared by every layer of the service.
///
/// # Error Code Ranges
///
/// | Range     | Category             | HTTP Status                      |
/// |-----------|----------------------|----------------------------------|
/// | 1000–1999 | Input / identity     | 400 Bad Request / 401            |
/// | 2000–2999 | Lookup / state       | 403 / 404 / 409 Conflict         |
/// | 3000–3999 | Server               | 500 Internal Server Error        |
/// | 4000–4999 | Swap eligibility     | 422 Unprocessable Entity         |
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    /// Malformed input; the caller must correct it.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The caller identity was missing or unreadable.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// No event with the given id exists.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// No swap request with the given id exists.
    #[error("swap request not found: {0}")]
    SwapRequestNotFound(SwapRequestId),

    /// The caller lacks rights over the record.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The operation is not legal in the record's current status.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A conditional update lost a race; refresh and retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The requested swap violates an eligibility rule.
    #[error("invalid swap: {0}")]
    InvalidSwap(String),

    /// Stored data contradicts an invariant. Nothing was mutated.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SwapError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::Unauthenticated(_) => 1002,
            Self::EventNotFound(_) => 2001,
            Self::SwapRequestNotFound(_) => 2002,
            Self::Forbidden(_) => 2003,
            Self::InvalidState(_) => 2004,
            Self::Conflict(_) => 2005,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::InternalInvariant(_) => 3002,
            Self::InvalidSwap(_) => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::EventNotFound(_) | Self::SwapRequestNotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidState(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidSwap(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InternalInvariant(_) | Self::Persistence(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns `true` when the failure was a lost optimistic-concurrency race
    /// and repeating the user action against fresh state may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<sqlx::Error> for SwapError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for SwapError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                retryable: self.is_retryable(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn only_conflict_is_retryable() {
        assert!(SwapError::Conflict("lost race".to_string()).is_retryable());
        assert!(!SwapError::InvalidState("resolved".to_string()).is_retryable());
        assert!(!SwapError::InvalidSwap("busy".to_string()).is_retryable());
        assert!(!SwapError::InternalInvariant("drift".to_string()).is_retryable());
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            SwapError::Validation(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SwapError::EventNotFound(EventId::new(1)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            SwapError::Forbidden(String::new()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            SwapError::Conflict(String::new()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            SwapError::InvalidSwap(String::new()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            SwapError::InternalInvariant(String::new()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_codes_are_distinct() {
        let errors = [
            SwapError::Validation(String::new()),
            SwapError::Unauthenticated(String::new()),
            SwapError::EventNotFound(EventId::new(1)),
            SwapError::SwapRequestNotFound(SwapRequestId::new(1)),
            SwapError::Forbidden(String::new()),
            SwapError::InvalidState(String::new()),
            SwapError::Conflict(String::new()),
            SwapError::InvalidSwap(String::new()),
            SwapError::InternalInvariant(String::new()),
            SwapError::Persistence(String::new()),
            SwapError::Internal(String::new()),
        ];
        let mut codes: Vec<u32> = errors.iter().map(SwapError::error_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn response_carries_status() {
        let response = SwapError::EventNotFound(EventId::new(3)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
