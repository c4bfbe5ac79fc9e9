//! Data Transfer Objects for REST request/response serialization.
//!
//! Responses embed the domain [`crate::domain::Event`] and
//! [`crate::domain::SwapRequest`] records directly; ids serialize as JSON
//! numbers and timestamps as RFC 3339 strings.

pub mod common_dto;
pub mod event_dto;
pub mod swap_dto;

pub use common_dto::*;
pub use event_dto::*;
pub use swap_dto::*;
