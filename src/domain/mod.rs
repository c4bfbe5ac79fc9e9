//! Domain layer: records, stores, and the event system.
//!
//! This module contains the server-side domain model: typed identifiers,
//! events and swap requests with their status enums, the two concurrent
//! stores, and the bus that broadcasts committed transitions.

pub mod event;
pub mod event_bus;
pub mod event_store;
pub mod ids;
pub mod negotiation_event;
pub mod swap_request;
pub mod swap_request_store;

pub use event::{Event, EventStatus};
pub use event_bus::EventBus;
pub use event_store::{EventGuard, EventSnapshot, EventStore};
pub use ids::{EventId, SwapRequestId, UserId};
pub use negotiation_event::NegotiationEvent;
pub use swap_request::{SwapRequest, SwapStatus};
pub use swap_request_store::{SwapRequestGuard, SwapRequestStore};
