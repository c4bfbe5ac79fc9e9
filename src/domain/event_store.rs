//! Concurrent event storage with per-record locking and CAS transitions.
//!
//! [`EventStore`] keeps every event behind its own [`tokio::sync::RwLock`].
//! Mutations go through an [`EventGuard`] and happen in two steps: a
//! `prepare_*` call checks the expected prior state and returns a staged copy,
//! then [`EventGuard::commit`] writes it. A multi-record operation prepares
//! every record before committing any of them, so a failed check never leaves
//! partial effects behind.
//!
//! # Lock order
//!
//! Callers holding more than one event lock must acquire them in ascending id
//! order. [`EventStore::lock_pair`] and the list operations do this
//! internally.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use super::event::{normalize_title, validate_window};
use super::{Event, EventId, EventStatus, UserId};
use crate::error::SwapError;

/// `None` once the event has been deleted.
type EventSlot = Arc<RwLock<Option<Event>>>;

/// Central store for all events.
///
/// # Concurrency
///
/// - Reads of the same event run concurrently.
/// - Writes to different events run concurrently.
/// - Writes to the same event are serialized.
/// - Lock waits are bounded by the store's lock timeout and surface as
///   [`SwapError::Conflict`].
#[derive(Debug)]
pub struct EventStore {
    events: RwLock<HashMap<EventId, EventSlot>>,
    next_id: AtomicU64,
    lock_timeout: Duration,
}

/// Shared access to every event that existed when the snapshot was taken.
///
/// Writers to any covered event block until the snapshot is dropped.
#[derive(Debug)]
pub struct EventSnapshot {
    guards: Vec<OwnedRwLockReadGuard<Option<Event>>>,
}

impl EventSnapshot {
    /// Iterates live events in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.guards.iter().filter_map(|guard| (**guard).as_ref())
    }
}

/// Exclusive access to a single live event.
#[derive(Debug)]
pub struct EventGuard {
    id: EventId,
    guard: OwnedRwLockWriteGuard<Option<Event>>,
}

impl EventGuard {
    /// Returns the id of the locked event.
    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// Returns the locked event.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::EventNotFound`] if the event was deleted.
    pub fn current(&self) -> Result<&Event, SwapError> {
        (*self.guard)
            .as_ref()
            .ok_or(SwapError::EventNotFound(self.id))
    }

    /// Stages a status change conditioned on the current status.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if the current status is not
    /// `expected`, or [`SwapError::EventNotFound`] if the event was deleted.
    pub fn prepare_status(
        &self,
        expected: EventStatus,
        new_status: EventStatus,
    ) -> Result<Event, SwapError> {
        let current = self.current()?;
        check_expected(current, expected)?;
        let mut staged = current.clone();
        staged.status = new_status;
        staged.updated_at = Utc::now();
        Ok(staged)
    }

    /// Stages an ownership transfer conditioned on the current status.
    ///
    /// Only the negotiation engine transfers ownership, as part of an
    /// accepted swap.
    pub(crate) fn prepare_transfer(
        &self,
        expected: EventStatus,
        new_owner: UserId,
        new_status: EventStatus,
    ) -> Result<Event, SwapError> {
        let mut staged = self.prepare_status(expected, new_status)?;
        staged.owner_id = new_owner;
        Ok(staged)
    }

    /// Stages new title and time window values, keeping the status.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Validation`] if the resulting title or window is
    /// invalid, or [`SwapError::EventNotFound`] if the event was deleted.
    pub fn prepare_details(
        &self,
        title: Option<&str>,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Event, SwapError> {
        let mut staged = self.current()?.clone();
        if let Some(title) = title {
            staged.title = normalize_title(title)?;
        }
        if let Some(start) = start_time {
            staged.start_time = start;
        }
        if let Some(end) = end_time {
            staged.end_time = end;
        }
        validate_window(staged.start_time, staged.end_time)?;
        staged.updated_at = Utc::now();
        Ok(staged)
    }

    /// Writes a staged copy produced by one of the `prepare_*` methods.
    pub fn commit(&mut self, staged: Event) {
        debug_assert_eq!(staged.id, self.id, "staged event committed to wrong guard");
        *self.guard = Some(staged);
    }
}

impl EventStore {
    /// Creates an empty store whose lock waits give up after `lock_timeout`.
    #[must_use]
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            lock_timeout,
        }
    }

    /// Creates a new `BUSY` event.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Validation`] if the title is blank or too long,
    /// or if `end_time` is not after `start_time`.
    pub async fn create_event(
        &self,
        owner_id: UserId,
        title: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Event, SwapError> {
        let title = normalize_title(title)?;
        validate_window(start_time, end_time)?;

        let id = EventId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let now = Utc::now();
        let event = Event {
            id,
            title,
            start_time,
            end_time,
            status: EventStatus::Busy,
            owner_id,
            created_at: now,
            updated_at: now,
        };

        let mut map = self.events.write().await;
        map.insert(id, Arc::new(RwLock::new(Some(event.clone()))));
        Ok(event)
    }

    /// Returns a copy of the event.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::EventNotFound`] if no such event exists, or
    /// [`SwapError::Conflict`] if the read lock could not be acquired in
    /// time.
    pub async fn get(&self, id: EventId) -> Result<Event, SwapError> {
        let slot = self.slot(id).await?;
        let guard = tokio::time::timeout(self.lock_timeout, slot.read())
            .await
            .map_err(|_| lock_timeout_error(id))?;
        (*guard).clone().ok_or(SwapError::EventNotFound(id))
    }

    /// Conditionally moves an event from `expected` to `new_status`.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if the event's status is not
    /// `expected` at the time of the update, or [`SwapError::EventNotFound`].
    pub async fn set_status(
        &self,
        id: EventId,
        expected: EventStatus,
        new_status: EventStatus,
    ) -> Result<Event, SwapError> {
        let mut guard = self.lock(id).await?;
        let staged = guard.prepare_status(expected, new_status)?;
        guard.commit(staged.clone());
        Ok(staged)
    }

    /// Acquires exclusive access to one event.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::EventNotFound`] if the event does not exist, or
    /// [`SwapError::Conflict`] if the lock wait timed out.
    pub async fn lock(&self, id: EventId) -> Result<EventGuard, SwapError> {
        let slot = self.slot(id).await?;
        self.lock_slot(id, slot).await
    }

    /// Acquires exclusive access to two distinct events, lower id first.
    ///
    /// The guards are returned in argument order.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Validation`] if `a == b`,
    /// [`SwapError::EventNotFound`] if either event is missing, or
    /// [`SwapError::Conflict`] if a lock wait timed out.
    pub async fn lock_pair(
        &self,
        a: EventId,
        b: EventId,
    ) -> Result<(EventGuard, EventGuard), SwapError> {
        if a == b {
            return Err(SwapError::Validation(format!(
                "cannot lock event {a} twice"
            )));
        }
        let slot_a = self.slot(a).await?;
        let slot_b = self.slot(b).await?;

        if a < b {
            let guard_a = self.lock_slot(a, slot_a).await?;
            let guard_b = self.lock_slot(b, slot_b).await?;
            Ok((guard_a, guard_b))
        } else {
            let guard_b = self.lock_slot(b, slot_b).await?;
            let guard_a = self.lock_slot(a, slot_a).await?;
            Ok((guard_a, guard_b))
        }
    }

    /// Deletes a locked event.
    ///
    /// The map write lock is taken before the slot is emptied, so a caller
    /// dropped while waiting for it leaves the event untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if the event is `SWAP_PENDING` or the
    /// map lock wait timed out, or [`SwapError::EventNotFound`] if it was
    /// already deleted.
    pub async fn remove_locked(&self, mut guard: EventGuard) -> Result<Event, SwapError> {
        let status = guard.current()?.status;
        if status == EventStatus::SwapPending {
            return Err(SwapError::Conflict(format!(
                "event {} is committed to a pending swap",
                guard.id
            )));
        }
        let mut map = tokio::time::timeout(self.lock_timeout, self.events.write())
            .await
            .map_err(|_| lock_timeout_error(guard.id))?;
        let removed = guard.guard.take().ok_or(SwapError::EventNotFound(guard.id))?;
        map.remove(&guard.id);
        Ok(removed)
    }

    /// Deletes an event unless it is `SWAP_PENDING`.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if the event is `SWAP_PENDING` or the
    /// lock wait timed out, or [`SwapError::EventNotFound`].
    pub async fn delete(&self, id: EventId) -> Result<Event, SwapError> {
        let guard = self.lock(id).await?;
        self.remove_locked(guard).await
    }

    /// Returns all events owned by `owner_id`, in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if a read lock wait timed out.
    pub async fn list_by_owner(&self, owner_id: UserId) -> Result<Vec<Event>, SwapError> {
        self.list_matching(|event| event.owner_id == owner_id).await
    }

    /// Returns all events with the given status, in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if a read lock wait timed out.
    pub async fn list_by_status(&self, status: EventStatus) -> Result<Vec<Event>, SwapError> {
        self.list_matching(|event| event.status == status).await
    }

    /// Returns a consistent snapshot of every event satisfying `predicate`.
    ///
    /// Built from [`Self::snapshot`], so a concurrent multi-event commit is
    /// seen either entirely or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if a read lock wait timed out.
    pub async fn list_matching<F>(&self, predicate: F) -> Result<Vec<Event>, SwapError>
    where
        F: Fn(&Event) -> bool,
    {
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .iter()
            .filter(|event| predicate(event))
            .cloned()
            .collect())
    }

    /// Read-locks every event in ascending id order and returns the guards.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if any read lock wait timed out. Guards
    /// acquired so far are released.
    pub async fn snapshot(&self) -> Result<EventSnapshot, SwapError> {
        let mut slots: Vec<(EventId, EventSlot)> = {
            let map = self.events.read().await;
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
        Ok(EventSnapshot { guards })
    }

    /// Returns the number of live events.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns `true` if the store holds no events.
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    async fn slot(&self, id: EventId) -> Result<EventSlot, SwapError> {
        let map = self.events.read().await;
        map.get(&id).cloned().ok_or(SwapError::EventNotFound(id))
    }

    async fn lock_slot(&self, id: EventId, slot: EventSlot) -> Result<EventGuard, SwapError> {
        let guard = tokio::time::timeout(self.lock_timeout, slot.write_owned())
            .await
            .map_err(|_| lock_timeout_error(id))?;
        if guard.is_none() {
            return Err(SwapError::EventNotFound(id));
        }
        Ok(EventGuard { id, guard })
    }
}

fn check_expected(current: &Event, expected: EventStatus) -> Result<(), SwapError> {
    if current.status != expected {
        return Err(SwapError::Conflict(format!(
            "event {} is {}, expected {}",
            current.id, current.status, expected
        )));
    }
    Ok(())
}

fn lock_timeout_error(id: EventId) -> SwapError {
    tracing::warn!(event_id = %id, "timed out waiting for event lock");
    SwapError::Conflict(format!("timed out waiting for event {id}"))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn make_store() -> EventStore {
        EventStore::new(Duration::from_millis(200))
    }

    async fn make_event(store: &EventStore, owner: u64) -> Event {
        let start = Utc::now();
        let Ok(event) = store
            .create_event(
                UserId::new(owner),
                "Team sync",
                start,
                start + ChronoDuration::hours(1),
            )
            .await
        else {
            panic!("event creation failed");
        };
        event
    }

    #[tokio::test]
    async fn create_starts_busy_with_increasing_ids() {
        let store = make_store();
        let first = make_event(&store, 1).await;
        let second = make_event(&store, 1).await;

        assert_eq!(first.status, EventStatus::Busy);
        assert!(second.id > first.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn create_rejects_inverted_window() {
        let store = make_store();
        let start = Utc::now();
        let result = store
            .create_event(UserId::new(1), "Slot", start, start - ChronoDuration::hours(1))
            .await;
        assert!(matches!(result, Err(SwapError::Validation(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn create_rejects_empty_title() {
        let store = make_store();
        let start = Utc::now();
        let result = store
            .create_event(UserId::new(1), "", start, start + ChronoDuration::hours(1))
            .await;
        assert!(matches!(result, Err(SwapError::Validation(_))));
    }

    #[tokio::test]
    async fn set_status_applies_when_expected_matches() {
        let store = make_store();
        let event = make_event(&store, 1).await;

        let result = store
            .set_status(event.id, EventStatus::Busy, EventStatus::Swappable)
            .await;
        let Ok(updated) = result else {
            panic!("cas failed");
        };
        assert_eq!(updated.status, EventStatus::Swappable);

        let Ok(fetched) = store.get(event.id).await else {
            panic!("event missing");
        };
        assert_eq!(fetched.status, EventStatus::Swappable);
    }

    #[tokio::test]
    async fn set_status_conflicts_on_stale_expectation() {
        let store = make_store();
        let event = make_event(&store, 1).await;

        let result = store
            .set_status(event.id, EventStatus::Swappable, EventStatus::SwapPending)
            .await;
        assert!(matches!(result, Err(SwapError::Conflict(_))));

        let Ok(fetched) = store.get(event.id).await else {
            panic!("event missing");
        };
        assert_eq!(fetched.status, EventStatus::Busy);
    }

    #[tokio::test]
    async fn concurrent_cas_has_single_winner() {
        let store = Arc::new(make_store());
        let event = make_event(&store, 1).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .set_status(event.id, EventStatus::Busy, EventStatus::Swappable)
                    .await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await {
                Ok(Ok(_)) => wins += 1,
                Ok(Err(SwapError::Conflict(_))) => conflicts += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn get_missing_returns_not_found() {
        let store = make_store();
        let result = store.get(EventId::new(99)).await;
        assert!(matches!(result, Err(SwapError::EventNotFound(_))));
    }

    #[tokio::test]
    async fn delete_refuses_swap_pending() {
        let store = make_store();
        let event = make_event(&store, 1).await;
        let _ = store
            .set_status(event.id, EventStatus::Busy, EventStatus::SwapPending)
            .await;

        let result = store.delete(event.id).await;
        assert!(matches!(result, Err(SwapError::Conflict(_))));
        assert!(store.get(event.id).await.is_ok());
    }

    #[tokio::test]
    async fn delete_removes_event() {
        let store = make_store();
        let event = make_event(&store, 1).await;

        assert!(store.delete(event.id).await.is_ok());
        assert!(matches!(
            store.get(event.id).await,
            Err(SwapError::EventNotFound(_))
        ));
        assert!(matches!(
            store.delete(event.id).await,
            Err(SwapError::EventNotFound(_))
        ));
    }

    #[tokio::test]
    async fn lock_pair_returns_argument_order() {
        let store = make_store();
        let low = make_event(&store, 1).await;
        let high = make_event(&store, 2).await;

        let Ok((first, second)) = store.lock_pair(high.id, low.id).await else {
            panic!("lock_pair failed");
        };
        assert_eq!(first.id(), high.id);
        assert_eq!(second.id(), low.id);
    }

    #[tokio::test]
    async fn lock_pair_rejects_same_event() {
        let store = make_store();
        let event = make_event(&store, 1).await;
        let result = store.lock_pair(event.id, event.id).await;
        assert!(matches!(result, Err(SwapError::Validation(_))));
    }

    #[tokio::test]
    async fn lock_wait_times_out_as_conflict() {
        let store = make_store();
        let event = make_event(&store, 1).await;

        let Ok(_held) = store.lock(event.id).await else {
            panic!("first lock failed");
        };
        let result = store.lock(event.id).await;
        assert!(matches!(result, Err(SwapError::Conflict(_))));
    }

    #[tokio::test]
    async fn prepare_does_not_mutate_until_commit() {
        let store = make_store();
        let event = make_event(&store, 1).await;

        {
            let Ok(guard) = store.lock(event.id).await else {
                panic!("lock failed");
            };
            let staged = guard.prepare_transfer(EventStatus::Busy, UserId::new(2), EventStatus::Swappable);
            assert!(staged.is_ok());
            // guard dropped without commit
        }

        let Ok(fetched) = store.get(event.id).await else {
            panic!("event missing");
        };
        assert_eq!(fetched.owner_id, UserId::new(1));
        assert_eq!(fetched.status, EventStatus::Busy);
    }

    #[tokio::test]
    async fn prepare_details_revalidates_window() {
        let store = make_store();
        let event = make_event(&store, 1).await;
        let Ok(guard) = store.lock(event.id).await else {
            panic!("lock failed");
        };

        let bad_end = event.start_time - ChronoDuration::minutes(5);
        let result = guard.prepare_details(None, None, Some(bad_end));
        assert!(matches!(result, Err(SwapError::Validation(_))));

        let Ok(staged) = guard.prepare_details(Some(" Retro "), None, None) else {
            panic!("valid details rejected");
        };
        assert_eq!(staged.title, "Retro");
    }

    #[tokio::test]
    async fn listings_filter_by_owner_and_status() {
        let store = make_store();
        let a1 = make_event(&store, 1).await;
        let _a2 = make_event(&store, 1).await;
        let b1 = make_event(&store, 2).await;
        let _ = store
            .set_status(b1.id, EventStatus::Busy, EventStatus::Swappable)
            .await;

        let Ok(owned) = store.list_by_owner(UserId::new(1)).await else {
            panic!("owner listing failed");
        };
        assert_eq!(owned.len(), 2);
        assert_eq!(owned.first().map(|e| e.id), Some(a1.id));

        let Ok(swappable) = store.list_by_status(EventStatus::Swappable).await else {
            panic!("status listing failed");
        };
        assert_eq!(swappable.len(), 1);
        assert_eq!(swappable.first().map(|e| e.id), Some(b1.id));
    }

    #[tokio::test]
    async fn snapshot_blocks_writers_until_dropped() {
        let store = make_store();
        let event = make_event(&store, 1).await;

        let Ok(snapshot) = store.snapshot().await else {
            panic!("snapshot failed");
        };
        assert_eq!(snapshot.iter().count(), 1);
        let blocked = store
            .set_status(event.id, EventStatus::Busy, EventStatus::Swappable)
            .await;
        assert!(matches!(blocked, Err(SwapError::Conflict(_))));

        drop(snapshot);
        assert!(
            store
                .set_status(event.id, EventStatus::Busy, EventStatus::Swappable)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn snapshot_times_out_behind_writer() {
        let store = make_store();
        let event = make_event(&store, 1).await;

        let Ok(_held) = store.lock(event.id).await else {
            panic!("lock failed");
        };
        assert!(matches!(store.snapshot().await, Err(SwapError::Conflict(_))));
        assert!(matches!(
            store.list_by_owner(UserId::new(1)).await,
            Err(SwapError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_delete_leaves_event_in_place() {
        let store = make_store();
        let event = make_event(&store, 1).await;

        let reader = store.events.read().await;
        let outcome = tokio::time::timeout(Duration::from_millis(50), store.delete(event.id)).await;
        assert!(outcome.is_err(), "delete should still be waiting for the map");
        drop(reader);

        let Ok(fetched) = store.get(event.id).await else {
            panic!("cancelled delete removed the event");
        };
        assert_eq!(fetched.id, event.id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn delete_blocked_on_map_times_out_without_effect() {
        let store = make_store();
        let event = make_event(&store, 1).await;

        let reader = store.events.read().await;
        let result = store.delete(event.id).await;
        assert!(matches!(result, Err(SwapError::Conflict(_))));
        drop(reader);

        assert!(store.get(event.id).await.is_ok());
        assert!(store.delete(event.id).await.is_ok());
        assert!(store.is_empty().await);
    }
}
