//! # slot-swapper
//!
//! REST service for publishing personal time slots and trading them with
//! other users through a request/accept negotiation.
//!
//! The core is the negotiation engine: events move BUSY → SWAPPABLE →
//! SWAP_PENDING, swap requests move PENDING → ACCEPTED/REJECTED, and an
//! accepted swap exchanges the owners of two events in one indivisible step.
//! Callers are authenticated upstream; the HTTP layer trusts the user id
//! header forwarded by the access gateway.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers + Caller extractor (api/)
//!     │
//!     ├── NegotiationEngine (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── EventStore / SwapRequestStore (domain/)
//!     │
//!     └── PostgreSQL negotiation log (persistence/, optional)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
