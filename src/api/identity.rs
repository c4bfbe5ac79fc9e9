//! Caller identity extraction.
//!
//! Authentication happens upstream in the access gateway, which forwards the
//! verified user id in a header (`x-user-id` unless `IDENTITY_HEADER` says
//! otherwise). Handlers take a [`Caller`] argument to require it.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::SwapError;

/// Authenticated caller of the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

impl Caller {
    /// Returns the caller's user id.
    #[must_use]
    pub const fn user_id(self) -> UserId {
        self.0
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = SwapError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = &state.identity_header;
        let value = parts
            .headers
            .get(header)
            .ok_or_else(|| SwapError::Unauthenticated(format!("missing {header} header")))?;

        let user_id = value
            .to_str()
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                SwapError::Unauthenticated(format!("{header} header is not a numeric user id"))
            })?;

        Ok(Self(UserId::new(user_id)))
    }
}
