//! Background tasks that feed and prune the negotiation log.

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::models::NewLogEntry;
use super::postgres::PostgresEventLog;
use crate::domain::EventBus;

/// Interval between retention sweeps.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Subscribes to `bus` and appends every event to `log` until the bus
/// closes.
///
/// Database failures are logged and the event is dropped; the in-memory
/// state stays authoritative.
pub fn spawn_log_writer(log: PostgresEventLog, bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "negotiation log writer lagged, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let entry = match NewLogEntry::from_event(&event) {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::error!(error = %err, event_type = event.event_type_str(), "cannot encode log entry");
                    continue;
                }
            };

            if let Err(err) = log.append(&entry).await {
                tracing::error!(
                    error = %err,
                    event_type = entry.event_type,
                    aggregate_id = entry.aggregate_id,
                    "failed to append negotiation log entry"
                );
            }
        }
        tracing::debug!("negotiation log writer stopped");
    })
}

/// Periodically deletes log entries older than `retention_days`.
///
/// Returns `None` when `retention_days` is zero (keep forever).
pub fn spawn_cleanup(
    log: PostgresEventLog,
    retention_days: u64,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if retention_days == 0 {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match log.delete_older_than(retention_days).await {
                Ok(0) => {}
                Ok(deleted) => tracing::info!(deleted, retention_days, "pruned negotiation log"),
                Err(err) => tracing::error!(error = %err, "negotiation log cleanup failed"),
            }
        }
    }))
}
