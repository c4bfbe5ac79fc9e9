//! Service layer: business logic orchestration.
//!
//! [`NegotiationEngine`] owns the swap state machine. It coordinates the
//! event and swap request stores, enforces ownership and state rules, and
//! emits events through the [`super::domain::EventBus`].

pub mod negotiation;

pub use negotiation::{ConsistencyReport, NegotiationEngine, SwapRequestView};
