//! Concurrent swap request storage with CAS status transitions.
//!
//! Same locking discipline as [`super::EventStore`]: one
//! [`tokio::sync::RwLock`] per record, staged changes committed through a
//! [`SwapRequestGuard`]. Terminal statuses are never overwritten.
//!
//! In the global lock order, swap request locks come after every event lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use super::{EventId, SwapRequest, SwapRequestId, SwapStatus, UserId};
use crate::error::SwapError;

type RequestSlot = Arc<RwLock<SwapRequest>>;

/// Central store for all swap requests. Requests are never deleted.
#[derive(Debug)]
pub struct SwapRequestStore {
    requests: RwLock<HashMap<SwapRequestId, RequestSlot>>,
    next_id: AtomicU64,
    lock_timeout: Duration,
}

/// Exclusive access to a single swap request.
#[derive(Debug)]
pub struct SwapRequestGuard {
    guard: OwnedRwLockWriteGuard<SwapRequest>,
}

impl SwapRequestGuard {
    /// Returns the locked request.
    #[must_use]
    pub fn current(&self) -> &SwapRequest {
        &self.guard
    }

    /// Stages a status change conditioned on the current status.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::InvalidState`] if the request is already in a
    /// terminal status or `new_status` is `PENDING`, and
    /// [`SwapError::Conflict`] if the current status is not `expected`.
    pub fn prepare_status(
        &self,
        expected: SwapStatus,
        new_status: SwapStatus,
    ) -> Result<SwapRequest, SwapError> {
        let current = self.current();
        if current.status.is_terminal() {
            return Err(SwapError::InvalidState(format!(
                "swap request {} is already {}",
                current.id, current.status
            )));
        }
        if current.status != expected {
            return Err(SwapError::Conflict(format!(
                "swap request {} is {}, expected {}",
                current.id, current.status, expected
            )));
        }
        if !new_status.is_terminal() {
            return Err(SwapError::InvalidState(format!(
                "swap request {} can only move to a terminal status",
                current.id
            )));
        }
        let mut staged = current.clone();
        staged.status = new_status;
        staged.resolved_at = Some(Utc::now());
        Ok(staged)
    }

    /// Writes a staged copy produced by [`Self::prepare_status`].
    pub fn commit(&mut self, staged: SwapRequest) {
        debug_assert_eq!(staged.id, self.guard.id, "staged request committed to wrong guard");
        *self.guard = staged;
    }
}

impl SwapRequestStore {
    /// Creates an empty store whose lock waits give up after `lock_timeout`.
    #[must_use]
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            lock_timeout,
        }
    }

    /// Creates a `PENDING` request.
    pub async fn create(
        &self,
        requester_id: UserId,
        responder_id: UserId,
        requester_event_id: EventId,
        responder_event_id: EventId,
    ) -> SwapRequest {
        let guard = self
            .create_locked(
                requester_id,
                responder_id,
                requester_event_id,
                responder_event_id,
            )
            .await;
        guard.current().clone()
    }

    /// Creates a `PENDING` request and returns it still write-locked.
    ///
    /// Readers block on the new record until the guard is dropped, which
    /// lets the caller finish committing related records first.
    pub async fn create_locked(
        &self,
        requester_id: UserId,
        responder_id: UserId,
        requester_event_id: EventId,
        responder_event_id: EventId,
    ) -> SwapRequestGuard {
        let id = SwapRequestId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = SwapRequest {
            id,
            requester_id,
            responder_id,
            requester_event_id,
            responder_event_id,
            status: SwapStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        };

        let slot = Arc::new(RwLock::new(request));
        // Fresh lock, nobody else can hold it yet.
        let guard = Arc::clone(&slot).write_owned().await;
        self.requests.write().await.insert(id, slot);
        SwapRequestGuard { guard }
    }

    /// Returns a copy of the request.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::SwapRequestNotFound`] if no such request exists,
    /// or [`SwapError::Conflict`] if the read lock could not be acquired in
    /// time.
    pub async fn get(&self, id: SwapRequestId) -> Result<SwapRequest, SwapError> {
        let slot = self.slot(id).await?;
        let guard = tokio::time::timeout(self.lock_timeout, slot.read())
            .await
            .map_err(|_| lock_timeout_error(id))?;
        Ok((*guard).clone())
    }

    /// Acquires exclusive access to one request.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::SwapRequestNotFound`] if the request does not
    /// exist, or [`SwapError::Conflict`] if the lock wait timed out.
    pub async fn lock(&self, id: SwapRequestId) -> Result<SwapRequestGuard, SwapError> {
        let slot = self.slot(id).await?;
        let guard = tokio::time::timeout(self.lock_timeout, slot.write_owned())
            .await
            .map_err(|_| lock_timeout_error(id))?;
        Ok(SwapRequestGuard { guard })
    }

    /// Conditionally moves a request from `expected` to `new_status`.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::SwapRequestNotFound`], [`SwapError::InvalidState`]
    /// if the request is already terminal, or [`SwapError::Conflict`] if its
    /// status is not `expected`.
    pub async fn set_status(
        &self,
        id: SwapRequestId,
        expected: SwapStatus,
        new_status: SwapStatus,
    ) -> Result<SwapRequest, SwapError> {
        let mut guard = self.lock(id).await?;
        let staged = guard.prepare_status(expected, new_status)?;
        guard.commit(staged.clone());
        Ok(staged)
    }

    /// Returns requests where `user_id` is the responder, in ascending id
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if a read lock wait timed out.
    pub async fn list_incoming(&self, user_id: UserId) -> Result<Vec<SwapRequest>, SwapError> {
        self.list_matching(|request| request.responder_id == user_id)
            .await
    }

    /// Returns requests made by `user_id`, in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if a read lock wait timed out.
    pub async fn list_outgoing(&self, user_id: UserId) -> Result<Vec<SwapRequest>, SwapError> {
        self.list_matching(|request| request.requester_id == user_id)
            .await
    }

    /// Returns a consistent snapshot of every request satisfying `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if a read lock wait timed out.
    pub async fn list_matching<F>(&self, predicate: F) -> Result<Vec<SwapRequest>, SwapError>
    where
        F: Fn(&SwapRequest) -> bool,
    {
        let mut slots: Vec<(SwapRequestId, RequestSlot)> = {
            let map = self.requests.read().await;
            map.iter().map(|(id, slot)| (*id, Arc::clone(slot))).collect()
        };
        slots.sort_unstable_by_key(|(id, _)| *id);

        let mut guards = Vec::with_capacity(slots.len());
        for (id, slot) in slots {
            let guard = tokio::time::timeout(self.lock_timeout, slot.read_owned())
                .await
                .map_err(|_| lock_timeout_error(id))?;
            guards.push(guard);
        }

        Ok(guards
            .iter()
            .map(|guard| &**guard)
            .filter(|request| predicate(request))
            .cloned()
            .collect())
    }

    /// Returns the number of stored requests.
    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Returns `true` if the store holds no requests.
    pub async fn is_empty(&self) -> bool {
        self.requests.read().await.is_empty()
    }

    async fn slot(&self, id: SwapRequestId) -> Result<RequestSlot, SwapError> {
        let map = self.requests.read().await;
        map.get(&id)
            .cloned()
            .ok_or(SwapError::SwapRequestNotFound(id))
    }
}

fn lock_timeout_error(id: SwapRequestId) -> SwapError {
    tracing::warn!(request_id = %id, "timed out waiting for swap request lock");
    SwapError::Conflict(format!("timed out waiting for swap request {id}"))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_store() -> SwapRequestStore {
        SwapRequestStore::new(Duration::from_millis(200))
    }

    async fn make_request(store: &SwapRequestStore) -> SwapRequest {
        store
            .create(UserId::new(1), UserId::new(2), EventId::new(10), EventId::new(20))
            .await
    }

    #[tokio::test]
    async fn create_starts_pending() {
        let store = make_store();
        let request = make_request(&store).await;

        assert_eq!(request.status, SwapStatus::Pending);
        assert!(request.resolved_at.is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn set_status_resolves_once() {
        let store = make_store();
        let request = make_request(&store).await;

        let Ok(resolved) = store
            .set_status(request.id, SwapStatus::Pending, SwapStatus::Accepted)
            .await
        else {
            panic!("cas failed");
        };
        assert_eq!(resolved.status, SwapStatus::Accepted);
        assert!(resolved.resolved_at.is_some());

        let second = store
            .set_status(request.id, SwapStatus::Pending, SwapStatus::Rejected)
            .await;
        assert!(matches!(second, Err(SwapError::InvalidState(_))));

        let Ok(fetched) = store.get(request.id).await else {
            panic!("request missing");
        };
        assert_eq!(fetched.status, SwapStatus::Accepted);
    }

    #[tokio::test]
    async fn terminal_status_cannot_be_overwritten_even_with_matching_expectation() {
        let store = make_store();
        let request = make_request(&store).await;
        let _ = store
            .set_status(request.id, SwapStatus::Pending, SwapStatus::Rejected)
            .await;

        let result = store
            .set_status(request.id, SwapStatus::Rejected, SwapStatus::Accepted)
            .await;
        assert!(matches!(result, Err(SwapError::InvalidState(_))));
    }

    #[tokio::test]
    async fn stale_expectation_conflicts() {
        let store = make_store();
        let request = make_request(&store).await;

        let result = store
            .set_status(request.id, SwapStatus::Accepted, SwapStatus::Rejected)
            .await;
        assert!(matches!(result, Err(SwapError::Conflict(_))));
    }

    #[tokio::test]
    async fn cannot_move_back_to_pending() {
        let store = make_store();
        let request = make_request(&store).await;

        let result = store
            .set_status(request.id, SwapStatus::Pending, SwapStatus::Pending)
            .await;
        assert!(matches!(result, Err(SwapError::InvalidState(_))));
    }

    #[tokio::test]
    async fn readers_wait_for_locked_creation() {
        let store = Arc::new(make_store());
        let guard = store
            .create_locked(UserId::new(1), UserId::new(2), EventId::new(1), EventId::new(2))
            .await;
        let id = guard.current().id;

        let result = store.get(id).await;
        assert!(matches!(result, Err(SwapError::Conflict(_))));

        drop(guard);
        assert!(store.get(id).await.is_ok());
    }

    #[tokio::test]
    async fn incoming_and_outgoing_split_by_role() {
        let store = make_store();
        let _ = make_request(&store).await;
        let _ = store
            .create(UserId::new(2), UserId::new(3), EventId::new(20), EventId::new(30))
            .await;

        let count = |result: Result<Vec<SwapRequest>, SwapError>| match result {
            Ok(requests) => requests.len(),
            Err(err) => panic!("listing failed: {err}"),
        };
        assert_eq!(count(store.list_outgoing(UserId::new(1)).await), 1);
        assert_eq!(count(store.list_incoming(UserId::new(2)).await), 1);
        assert_eq!(count(store.list_outgoing(UserId::new(2)).await), 1);
        assert_eq!(count(store.list_incoming(UserId::new(1)).await), 0);
    }

    #[tokio::test]
    async fn listing_times_out_behind_locked_request() {
        let store = make_store();
        let request = make_request(&store).await;

        let Ok(_held) = store.lock(request.id).await else {
            panic!("lock failed");
        };
        let result = store.list_incoming(UserId::new(2)).await;
        assert!(matches!(result, Err(SwapError::Conflict(_))));
    }

    #[tokio::test]
    async fn get_missing_returns_not_found() {
        let store = make_store();
        let result = store.get(SwapRequestId::new(5)).await;
        assert!(matches!(result, Err(SwapError::SwapRequestNotFound(_))));
    }
}
