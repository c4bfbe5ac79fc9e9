//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use axum::http::HeaderName;

use crate::config::AppConfig;
use crate::domain::{EventBus, EventStore, SwapRequestStore};
use crate::service::NegotiationEngine;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Negotiation engine for all business logic.
    pub engine: Arc<NegotiationEngine>,
    /// Event bus carrying committed transitions.
    pub event_bus: EventBus,
    /// Header the caller identity is read from.
    pub identity_header: HeaderName,
}

impl AppState {
    /// Builds empty stores, the bus, and the engine from `config`.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let engine = NegotiationEngine::new(
            Arc::new(EventStore::new(config.lock_timeout)),
            Arc::new(SwapRequestStore::new(config.lock_timeout)),
            event_bus.clone(),
        );
        Self {
            engine: Arc::new(engine),
            event_bus,
            identity_header: config.identity_header.clone(),
        }
    }
}
