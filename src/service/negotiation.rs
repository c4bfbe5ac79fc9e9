//! Negotiation engine: the swap state machine and event management.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    Event, EventBus, EventId, EventSnapshot, EventStatus, EventStore, NegotiationEvent,
    SwapRequest, SwapRequestId, SwapRequestStore, SwapStatus, UserId,
};
use crate::error::SwapError;

/// Orchestration layer for every event and swap operation.
///
/// Owns no data: state lives in the [`EventStore`] and [`SwapRequestStore`],
/// and committed transitions are announced on the [`EventBus`]. Every
/// mutation follows the same pattern: lock records in global order → check
/// every precondition and stage the new values → commit all staged values →
/// release locks → emit events.
///
/// Lost races are returned as [`SwapError::Conflict`] and never retried here.
#[derive(Debug, Clone)]
pub struct NegotiationEngine {
    events: Arc<EventStore>,
    requests: Arc<SwapRequestStore>,
    event_bus: EventBus,
}

/// A swap request with both referenced events, read at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SwapRequestView {
    /// The request itself.
    #[serde(flatten)]
    pub request: SwapRequest,
    /// Event offered by the requester, `None` once deleted.
    pub requester_event: Option<Event>,
    /// Event wanted by the requester, `None` once deleted.
    pub responder_event: Option<Event>,
}

/// Result of a consistency audit across both stores.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ConsistencyReport {
    /// Number of events inspected.
    pub events_checked: usize,
    /// Number of swap requests inspected.
    pub requests_checked: usize,
    /// Human-readable description of each violated invariant.
    pub violations: Vec<String>,
}

impl ConsistencyReport {
    /// Returns `true` when no invariant is violated.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

impl NegotiationEngine {
    /// Creates a new `NegotiationEngine`.
    #[must_use]
    pub fn new(
        events: Arc<EventStore>,
        requests: Arc<SwapRequestStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            events,
            requests,
            event_bus,
        }
    }

    /// Returns a reference to the inner [`EventStore`].
    #[must_use]
    pub fn events(&self) -> &Arc<EventStore> {
        &self.events
    }

    /// Returns a reference to the inner [`SwapRequestStore`].
    #[must_use]
    pub fn requests(&self) -> &Arc<SwapRequestStore> {
        &self.requests
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    // ── Event management ────────────────────────────────────────────────

    /// Creates a `BUSY` event owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Validation`] on a blank title or an empty time
    /// window.
    pub async fn create_event(
        &self,
        owner_id: UserId,
        title: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Event, SwapError> {
        let event = self
            .events
            .create_event(owner_id, title, start_time, end_time)
            .await?;

        let _ = self.event_bus.publish(NegotiationEvent::EventCreated {
            event_id: event.id,
            owner_id,
            timestamp: event.created_at,
        });

        tracing::info!(event_id = %event.id, %owner_id, "event created");
        Ok(event)
    }

    /// Returns a single event.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::EventNotFound`] if the event does not exist.
    pub async fn get_event(&self, event_id: EventId) -> Result<Event, SwapError> {
        self.events.get(event_id).await
    }

    /// Toggles an event between `BUSY` and `SWAPPABLE`.
    ///
    /// When `expected` is given, the change only applies if the event is
    /// still in that status. Setting the current status again is a no-op.
    ///
    /// # Errors
    ///
    /// - [`SwapError::Validation`] if `target` is `SWAP_PENDING`.
    /// - [`SwapError::EventNotFound`] if the event does not exist.
    /// - [`SwapError::Forbidden`] if `caller` does not own the event.
    /// - [`SwapError::InvalidState`] if the event is `SWAP_PENDING`.
    /// - [`SwapError::Conflict`] if `expected` does not match.
    pub async fn set_event_availability(
        &self,
        caller: UserId,
        event_id: EventId,
        target: EventStatus,
        expected: Option<EventStatus>,
    ) -> Result<Event, SwapError> {
        if !target.is_owner_settable() {
            return Err(SwapError::Validation(format!(
                "status {target} cannot be set directly"
            )));
        }

        let mut guard = self.events.lock(event_id).await?;
        let current = guard.current()?;
        ensure_owner(current, caller)?;
        ensure_not_pending(current)?;

        let old_status = current.status;
        if let Some(expected) = expected
            && expected != old_status
        {
            return Err(SwapError::Conflict(format!(
                "event {event_id} is {old_status}, expected {expected}"
            )));
        }
        if old_status == target {
            return Ok(current.clone());
        }

        let staged = guard.prepare_status(old_status, target)?;
        guard.commit(staged.clone());
        drop(guard);

        let _ = self.event_bus.publish(NegotiationEvent::EventStatusChanged {
            event_id,
            old_status,
            new_status: target,
            timestamp: staged.updated_at,
        });

        tracing::info!(%event_id, %old_status, new_status = %target, "event availability changed");
        Ok(staged)
    }

    /// Changes an event's title and/or time window.
    ///
    /// # Errors
    ///
    /// - [`SwapError::EventNotFound`] if the event does not exist.
    /// - [`SwapError::Forbidden`] if `caller` does not own the event.
    /// - [`SwapError::InvalidState`] if the event is `SWAP_PENDING`.
    /// - [`SwapError::Validation`] if the resulting title or window is
    ///   invalid.
    pub async fn update_event_details(
        &self,
        caller: UserId,
        event_id: EventId,
        title: Option<&str>,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Event, SwapError> {
        let mut guard = self.events.lock(event_id).await?;
        let current = guard.current()?;
        ensure_owner(current, caller)?;
        ensure_not_pending(current)?;

        let staged = guard.prepare_details(title, start_time, end_time)?;
        guard.commit(staged.clone());
        drop(guard);

        let _ = self.event_bus.publish(NegotiationEvent::EventUpdated {
            event_id,
            owner_id: caller,
            timestamp: staged.updated_at,
        });

        tracing::info!(%event_id, "event details updated");
        Ok(staged)
    }

    /// Deletes an event owned by `caller`.
    ///
    /// # Errors
    ///
    /// - [`SwapError::EventNotFound`] if the event does not exist.
    /// - [`SwapError::Forbidden`] if `caller` does not own the event.
    /// - [`SwapError::Conflict`] if the event is `SWAP_PENDING`.
    pub async fn delete_event(&self, caller: UserId, event_id: EventId) -> Result<(), SwapError> {
        let guard = self.events.lock(event_id).await?;
        ensure_owner(guard.current()?, caller)?;
        let removed = self.events.remove_locked(guard).await?;

        let _ = self.event_bus.publish(NegotiationEvent::EventDeleted {
            event_id,
            owner_id: removed.owner_id,
            timestamp: Utc::now(),
        });

        tracing::info!(%event_id, "event deleted");
        Ok(())
    }

    /// Returns every event owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if a read lock wait timed out.
    pub async fn list_my_events(&self, user_id: UserId) -> Result<Vec<Event>, SwapError> {
        self.events.list_by_owner(user_id).await
    }

    /// Returns every `SWAPPABLE` event not owned by `caller`.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if a read lock wait timed out.
    pub async fn list_swappable(&self, caller: UserId) -> Result<Vec<Event>, SwapError> {
        self.events
            .list_matching(|event| {
                event.status == EventStatus::Swappable && event.owner_id != caller
            })
            .await
    }

    // ── Swap negotiation ────────────────────────────────────────────────

    /// Offers `my_event_id` in exchange for `their_event_id`.
    ///
    /// Both events move from `SWAPPABLE` to `SWAP_PENDING` and a `PENDING`
    /// request is created, all in one atomic step.
    ///
    /// # Errors
    ///
    /// - [`SwapError::EventNotFound`] if either event does not exist.
    /// - [`SwapError::InvalidSwap`] if the two ids are equal, `requester`
    ///   does not own `my_event_id`, `requester` already owns
    ///   `their_event_id`, or either event is `BUSY`.
    /// - [`SwapError::Conflict`] if either event is already committed to
    ///   another pending swap, or a lock wait timed out.
    pub async fn request_swap(
        &self,
        requester: UserId,
        my_event_id: EventId,
        their_event_id: EventId,
    ) -> Result<SwapRequest, SwapError> {
        if my_event_id == their_event_id {
            self.events.get(my_event_id).await?;
            return Err(SwapError::InvalidSwap(format!(
                "event {my_event_id} cannot be swapped with itself"
            )));
        }

        let (mut mine, mut theirs) = self.events.lock_pair(my_event_id, their_event_id).await?;

        let my_event = mine.current()?;
        let their_event = theirs.current()?;
        if !my_event.is_owned_by(requester) {
            return Err(SwapError::InvalidSwap(format!(
                "event {my_event_id} is not owned by user {requester}"
            )));
        }
        if their_event.is_owned_by(requester) {
            return Err(SwapError::InvalidSwap(format!(
                "event {their_event_id} already belongs to user {requester}"
            )));
        }
        ensure_offerable(my_event)?;
        ensure_offerable(their_event)?;
        let responder = their_event.owner_id;

        let staged_mine = mine.prepare_status(EventStatus::Swappable, EventStatus::SwapPending)?;
        let staged_theirs =
            theirs.prepare_status(EventStatus::Swappable, EventStatus::SwapPending)?;

        let request_guard = self
            .requests
            .create_locked(requester, responder, my_event_id, their_event_id)
            .await;
        mine.commit(staged_mine);
        theirs.commit(staged_theirs);
        let request = request_guard.current().clone();
        drop(request_guard);
        drop(theirs);
        drop(mine);

        let _ = self.event_bus.publish(NegotiationEvent::SwapRequested {
            request_id: request.id,
            requester_id: requester,
            responder_id: responder,
            requester_event_id: my_event_id,
            responder_event_id: their_event_id,
            timestamp: request.created_at,
        });

        tracing::info!(
            request_id = %request.id,
            %requester,
            %responder,
            %my_event_id,
            %their_event_id,
            "swap requested"
        );
        Ok(request)
    }

    /// Resolves a pending swap request.
    ///
    /// Accepting exchanges the owners of both events and leaves both
    /// `SWAPPABLE` for their new owners. Rejecting returns both events to
    /// `SWAPPABLE` under their original owners. Either way the request, and
    /// both events, change in one atomic step.
    ///
    /// # Errors
    ///
    /// - [`SwapError::SwapRequestNotFound`] if the request does not exist.
    /// - [`SwapError::Forbidden`] if `responder` is not the request's
    ///   responder.
    /// - [`SwapError::InvalidState`] if the request is already resolved.
    /// - [`SwapError::InternalInvariant`] if either event is not in the state
    ///   a pending request guarantees. Nothing is mutated.
    /// - [`SwapError::Conflict`] if a lock wait timed out.
    pub async fn respond_to_swap(
        &self,
        responder: UserId,
        request_id: SwapRequestId,
        accept: bool,
    ) -> Result<SwapRequest, SwapError> {
        let snapshot = self.requests.get(request_id).await?;
        if snapshot.responder_id != responder {
            return Err(SwapError::Forbidden(format!(
                "user {responder} is not the responder of swap request {request_id}"
            )));
        }
        ensure_request_pending(&snapshot)?;

        let (mut requester_event, mut responder_event) = match self
            .events
            .lock_pair(snapshot.requester_event_id, snapshot.responder_event_id)
            .await
        {
            Ok(pair) => pair,
            Err(SwapError::EventNotFound(missing)) => {
                // Terminal requests may outlive their events.
                let latest = self.requests.get(request_id).await?;
                ensure_request_pending(&latest)?;
                return Err(invariant_violation(
                    request_id,
                    format!("event {missing} referenced by a pending request is missing"),
                ));
            }
            Err(err) => return Err(err),
        };
        let mut request = self.requests.lock(request_id).await?;
        ensure_request_pending(request.current())?;

        check_committed(
            request_id,
            requester_event.current()?,
            snapshot.requester_id,
        )?;
        check_committed(
            request_id,
            responder_event.current()?,
            snapshot.responder_id,
        )?;

        let (new_status, staged_requester_event, staged_responder_event) = if accept {
            (
                SwapStatus::Accepted,
                requester_event.prepare_transfer(
                    EventStatus::SwapPending,
                    snapshot.responder_id,
                    EventStatus::Swappable,
                )?,
                responder_event.prepare_transfer(
                    EventStatus::SwapPending,
                    snapshot.requester_id,
                    EventStatus::Swappable,
                )?,
            )
        } else {
            (
                SwapStatus::Rejected,
                requester_event.prepare_status(EventStatus::SwapPending, EventStatus::Swappable)?,
                responder_event.prepare_status(EventStatus::SwapPending, EventStatus::Swappable)?,
            )
        };
        let staged_request = request.prepare_status(SwapStatus::Pending, new_status)?;

        request.commit(staged_request.clone());
        requester_event.commit(staged_requester_event);
        responder_event.commit(staged_responder_event);
        drop(request);
        drop(responder_event);
        drop(requester_event);

        let resolved_at = staged_request.resolved_at.unwrap_or_else(Utc::now);
        let event = if accept {
            NegotiationEvent::SwapAccepted {
                request_id,
                requester_event_id: staged_request.requester_event_id,
                responder_event_id: staged_request.responder_event_id,
                timestamp: resolved_at,
            }
        } else {
            NegotiationEvent::SwapRejected {
                request_id,
                requester_event_id: staged_request.requester_event_id,
                responder_event_id: staged_request.responder_event_id,
                timestamp: resolved_at,
            }
        };
        let _ = self.event_bus.publish(event);

        tracing::info!(%request_id, %responder, status = %new_status, "swap request resolved");
        Ok(staged_request)
    }

    /// Returns a swap request visible to `caller`.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::SwapRequestNotFound`] if the request does not
    /// exist, or [`SwapError::Forbidden`] if `caller` is neither its
    /// requester nor its responder.
    pub async fn get_swap_request(
        &self,
        caller: UserId,
        request_id: SwapRequestId,
    ) -> Result<SwapRequest, SwapError> {
        let request = self.requests.get(request_id).await?;
        if !request.involves(caller) {
            return Err(SwapError::Forbidden(format!(
                "user {caller} is not a participant of swap request {request_id}"
            )));
        }
        Ok(request)
    }

    /// Returns requests addressed to `user_id`, each with both events.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if a read lock wait timed out.
    pub async fn list_incoming(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SwapRequestView>, SwapError> {
        let snapshot = self.events.snapshot().await?;
        let requests = self.requests.list_incoming(user_id).await?;
        Ok(attach_events(&snapshot, requests))
    }

    /// Returns requests made by `user_id`, each with both events.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if a read lock wait timed out.
    pub async fn list_outgoing(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SwapRequestView>, SwapError> {
        let snapshot = self.events.snapshot().await?;
        let requests = self.requests.list_outgoing(user_id).await?;
        Ok(attach_events(&snapshot, requests))
    }

    // ── Audit ───────────────────────────────────────────────────────────

    /// Checks that `SWAP_PENDING` events and `PENDING` requests match one to
    /// one, and that every pending request still reflects current ownership.
    ///
    /// Event read guards are held while requests are read, so the report
    /// reflects a single consistent point in time.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Conflict`] if a read lock wait timed out.
    pub async fn audit(&self) -> Result<ConsistencyReport, SwapError> {
        let snapshot = self.events.snapshot().await?;
        let pending = self
            .requests
            .list_matching(|request| request.status == SwapStatus::Pending)
            .await?;
        let requests_checked = self.requests.len().await;

        let mut report = ConsistencyReport {
            events_checked: 0,
            requests_checked,
            violations: Vec::new(),
        };

        let mut references: HashMap<EventId, usize> = HashMap::new();
        for request in &pending {
            *references.entry(request.requester_event_id).or_default() += 1;
            *references.entry(request.responder_event_id).or_default() += 1;
        }

        let mut events: HashMap<EventId, &Event> = HashMap::new();
        for event in snapshot.iter() {
            report.events_checked += 1;
            events.insert(event.id, event);

            let count = references.get(&event.id).copied().unwrap_or(0);
            let is_pending = event.status == EventStatus::SwapPending;
            if is_pending && count != 1 {
                report.violations.push(format!(
                    "event {} is SWAP_PENDING but referenced by {count} pending requests",
                    event.id
                ));
            } else if !is_pending && count != 0 {
                report.violations.push(format!(
                    "event {} is {} but referenced by {count} pending requests",
                    event.id, event.status
                ));
            }
        }

        for request in &pending {
            for (event_id, owner) in [
                (request.requester_event_id, request.requester_id),
                (request.responder_event_id, request.responder_id),
            ] {
                match events.get(&event_id) {
                    None => report.violations.push(format!(
                        "pending swap request {} references missing event {event_id}",
                        request.id
                    )),
                    Some(event) if event.owner_id != owner => report.violations.push(format!(
                        "pending swap request {} expects event {event_id} owned by {owner}, found {}",
                        request.id, event.owner_id
                    )),
                    Some(_) => {}
                }
            }
        }

        drop(events);
        drop(snapshot);

        if !report.is_consistent() {
            tracing::error!(violations = report.violations.len(), "consistency audit failed");
        }
        Ok(report)
    }
}

/// Pairs each request with the events it references, as seen by `snapshot`.
fn attach_events(
    snapshot: &EventSnapshot,
    requests: Vec<SwapRequest>,
) -> Vec<SwapRequestView> {
    let events: HashMap<EventId, &Event> =
        snapshot.iter().map(|event| (event.id, event)).collect();
    requests
        .into_iter()
        .map(|request| SwapRequestView {
            requester_event: events.get(&request.requester_event_id).map(|e| (*e).clone()),
            responder_event: events.get(&request.responder_event_id).map(|e| (*e).clone()),
            request,
        })
        .collect()
}

fn ensure_owner(event: &Event, caller: UserId) -> Result<(), SwapError> {
    if !event.is_owned_by(caller) {
        return Err(SwapError::Forbidden(format!(
            "user {caller} does not own event {}",
            event.id
        )));
    }
    Ok(())
}

fn ensure_not_pending(event: &Event) -> Result<(), SwapError> {
    if event.status == EventStatus::SwapPending {
        return Err(SwapError::InvalidState(format!(
            "event {} is committed to a pending swap",
            event.id
        )));
    }
    Ok(())
}

/// An event may be offered or requested only while `SWAPPABLE`. One that is
/// already `SWAP_PENDING` was claimed by another request first.
fn ensure_offerable(event: &Event) -> Result<(), SwapError> {
    match event.status {
        EventStatus::Swappable => Ok(()),
        EventStatus::SwapPending => Err(SwapError::Conflict(format!(
            "event {} is already committed to another swap",
            event.id
        ))),
        EventStatus::Busy => Err(SwapError::InvalidSwap(format!(
            "event {} is not swappable",
            event.id
        ))),
    }
}

fn ensure_request_pending(request: &SwapRequest) -> Result<(), SwapError> {
    if request.status != SwapStatus::Pending {
        return Err(SwapError::InvalidState(format!(
            "swap request {} is already {}",
            request.id, request.status
        )));
    }
    Ok(())
}

/// A pending request guarantees both events are `SWAP_PENDING` under the
/// owners recorded at creation.
fn check_committed(
    request_id: SwapRequestId,
    event: &Event,
    expected_owner: UserId,
) -> Result<(), SwapError> {
    if event.status != EventStatus::SwapPending {
        return Err(invariant_violation(
            request_id,
            format!(
                "event {} is {} while its swap request is pending",
                event.id, event.status
            ),
        ));
    }
    if event.owner_id != expected_owner {
        return Err(invariant_violation(
            request_id,
            format!(
                "event {} is owned by {}, expected {expected_owner}",
                event.id, event.owner_id
            ),
        ));
    }
    Ok(())
}

fn invariant_violation(request_id: SwapRequestId, detail: String) -> SwapError {
    tracing::error!(%request_id, %detail, "swap invariant violated");
    SwapError::InternalInvariant(detail)
}
