//! Persistence layer: optional PostgreSQL negotiation log.
//!
//! When `PERSISTENCE_ENABLED` is set, a background writer appends every
//! committed [`crate::domain::NegotiationEvent`] to the `negotiation_log`
//! table and a cleanup task enforces the retention window. The in-memory
//! stores remain the source of truth; the log is an audit trail.

pub mod models;
pub mod postgres;
pub mod writer;

pub use models::NewLogEntry;
pub use postgres::PostgresEventLog;
pub use writer::{CLEANUP_INTERVAL, spawn_cleanup, spawn_log_writer};
