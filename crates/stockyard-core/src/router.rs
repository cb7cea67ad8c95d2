//! The request router: owner of every request and every queue set.
//!
//! Requests live in a single arena keyed by [`RequestId`]; queue sets live
//! in a second arena keyed by [`QueueSetId`] and hold request handles only.
//! A request's back-reference is a `QueueSetId`, so moving it to another set
//! is one handle write and never creates an ownership cycle.
//!
//! All mutation goes through `&mut RequestRouter`. Share a router between a
//! simulation thread and a display thread with [`crate::shared::SharedRouter`].

use crate::id::{MaterialType, QueueSetId, RequestId};
use crate::position::GridPosition;
use crate::priority::Priority;
use crate::query::{QueueSetSnapshot, RequestSnapshot};
use crate::queue::{PriorityQueueSet, RequestArena};
use crate::request::{MaterialRequest, RequestDefaults};
use slotmap::{SecondaryMap, SlotMap};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors returned to callers that pass stale handles or break the queue
/// contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("request not found: {0:?}")]
    RequestNotFound(RequestId),
    #[error("queue set not found: {0:?}")]
    QueueSetNotFound(QueueSetId),
    #[error("source and destination are the same queue set: {0:?}")]
    SameQueueSet(QueueSetId),
    #[error("request {request:?} is already queued in {queue:?}")]
    AlreadyQueued {
        request: RequestId,
        queue: QueueSetId,
    },
    #[error("request {request:?} is not queued in {queue:?}")]
    NotQueued {
        request: RequestId,
        queue: QueueSetId,
    },
    #[error("queue set {queue:?} still holds {remaining} requests")]
    QueueSetNotEmpty { queue: QueueSetId, remaining: usize },
    #[error("request for zero units")]
    ZeroAmount,
}

/// A broken structural invariant, found by [`RequestRouter::validate`] or
/// while restoring a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("queue set {queue:?} holds unknown request {request:?}")]
    DanglingHandle {
        queue: QueueSetId,
        request: RequestId,
    },
    #[error("request {request:?} is queued in both {first:?} and {second:?}")]
    DuplicateLink {
        request: RequestId,
        first: QueueSetId,
        second: QueueSetId,
    },
    #[error("request {request:?} points at {found:?} but is held by {expected:?}")]
    BackReference {
        request: RequestId,
        expected: Option<QueueSetId>,
        found: Option<QueueSetId>,
    },
    #[error("request {request:?} sits in tier {tier:?} but has priority {priority:?}")]
    TierMismatch {
        request: RequestId,
        tier: Priority,
        priority: Priority,
    },
    #[error("request {request:?} has {in_delivery} units in flight, cap {cap}")]
    OverCommitted {
        request: RequestId,
        in_delivery: u32,
        cap: u32,
    },
}

// ---------------------------------------------------------------------------
// RequestRouter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RequestRouter {
    requests: RequestArena,
    sets: SlotMap<QueueSetId, PriorityQueueSet>,
    defaults: RequestDefaults,
}

impl RequestRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: RequestDefaults) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    pub fn defaults(&self) -> &RequestDefaults {
        &self.defaults
    }

    /// Build a request carrying this router's defaults. It is not registered.
    pub fn new_request(&self, position: GridPosition, material: MaterialType, amount: u32) -> MaterialRequest {
        MaterialRequest::with_defaults(position, material, amount, &self.defaults)
    }

    // -- Queue sets --

    pub fn create_queue_set(&mut self) -> QueueSetId {
        self.sets.insert(PriorityQueueSet::new())
    }

    /// Drop an empty queue set.
    pub fn remove_queue_set(&mut self, id: QueueSetId) -> Result<(), RouterError> {
        let set = self.sets.get(id).ok_or(RouterError::QueueSetNotFound(id))?;
        if !set.is_empty() {
            return Err(RouterError::QueueSetNotEmpty {
                queue: id,
                remaining: set.len(),
            });
        }
        self.sets.remove(id);
        Ok(())
    }

    pub fn queue_set(&self, id: QueueSetId) -> Option<&PriorityQueueSet> {
        self.sets.get(id)
    }

    pub fn queue_sets(&self) -> impl Iterator<Item = (QueueSetId, &PriorityQueueSet)> {
        self.sets.iter()
    }

    pub fn contains_queue_set(&self, id: QueueSetId) -> bool {
        self.sets.contains_key(id)
    }

    // -- Requests --

    pub fn request(&self, id: RequestId) -> Option<&MaterialRequest> {
        self.requests.get(id)
    }

    pub fn requests(&self) -> impl Iterator<Item = (RequestId, &MaterialRequest)> {
        self.requests.iter()
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    /// Requests owned by the building at `position`, queued or not.
    pub fn requests_at(&self, position: GridPosition) -> impl Iterator<Item = (RequestId, &MaterialRequest)> {
        self.requests
            .iter()
            .filter(move |(_, r)| r.position() == position)
    }

    /// Store a request without queueing it. Building-side stacks use this for
    /// needs that are served locally rather than by carriers.
    pub fn insert(&mut self, mut request: MaterialRequest) -> RequestId {
        request.set_queue(None);
        self.requests.insert(request)
    }

    /// Store a request and append it to the tier matching its priority.
    pub fn register(&mut self, set: QueueSetId, request: MaterialRequest) -> Result<RequestId, RouterError> {
        if !self.sets.contains_key(set) {
            return Err(RouterError::QueueSetNotFound(set));
        }
        let id = self.insert(request);
        self.link(set, id)?;
        Ok(id)
    }

    /// Append an unqueued request to `set`.
    pub fn link(&mut self, set: QueueSetId, id: RequestId) -> Result<(), RouterError> {
        let request = self.requests.get_mut(id).ok_or(RouterError::RequestNotFound(id))?;
        if let Some(queue) = request.queue() {
            return Err(RouterError::AlreadyQueued { request: id, queue });
        }
        let queue_set = self.sets.get_mut(set).ok_or(RouterError::QueueSetNotFound(set))?;
        queue_set.push_back(request.priority(), id);
        request.set_queue(Some(set));
        Ok(())
    }

    /// Take a request out of its queue. Returns `false` if it was not queued.
    pub fn unlink(&mut self, id: RequestId) -> Result<bool, RouterError> {
        let request = self.requests.get_mut(id).ok_or(RouterError::RequestNotFound(id))?;
        let Some(queue) = request.queue() else {
            return Ok(false);
        };
        if let Some(set) = self.sets.get_mut(queue) {
            set.remove(request.priority(), id);
        }
        request.set_queue(None);
        Ok(true)
    }

    /// Unlink a request and drop it from the arena.
    pub fn release(&mut self, id: RequestId) -> Result<MaterialRequest, RouterError> {
        self.unlink(id)?;
        let request = self.requests.remove(id).ok_or(RouterError::RequestNotFound(id))?;
        tracing::trace!(?id, still_needed = request.still_needed(), "released request");
        Ok(request)
    }

    /// Change a request's tier. A queued request moves to the back of its
    /// new tier.
    pub fn set_priority(&mut self, id: RequestId, priority: Priority) -> Result<(), RouterError> {
        let request = self.requests.get_mut(id).ok_or(RouterError::RequestNotFound(id))?;
        let old = request.priority();
        if old == priority {
            return Ok(());
        }
        if let Some(set) = request.queue().and_then(|queue| self.sets.get_mut(queue)) {
            set.remove(old, id);
            set.push_back(priority, id);
        }
        request.set_priority(priority);
        Ok(())
    }

    // -- Selection --

    /// Next servable request of one tier, or `None` if nothing can be served.
    pub fn select_next(&mut self, set: QueueSetId, priority: Priority) -> Result<Option<RequestId>, RouterError> {
        let queue_set = self.sets.get_mut(set).ok_or(RouterError::QueueSetNotFound(set))?;
        Ok(queue_set.select(priority, &mut self.requests))
    }

    /// Next servable request across tiers, highest tier first. A lower tier is
    /// only looked at when every higher tier came back empty.
    pub fn select_best(&mut self, set: QueueSetId) -> Result<Option<RequestId>, RouterError> {
        let queue_set = self.sets.get_mut(set).ok_or(RouterError::QueueSetNotFound(set))?;
        Ok(Priority::SERVED
            .into_iter()
            .find_map(|p| queue_set.select(p, &mut self.requests)))
    }

    // -- Delivery events --

    /// A carrier committed one unit to this request.
    ///
    /// # Panics
    ///
    /// If the request cannot take another unit in flight.
    pub fn dispatch(&mut self, id: RequestId) -> Result<(), RouterError> {
        self.request_mut(id)?.record_dispatch();
        Ok(())
    }

    /// A committed unit arrived. A queued request that needs nothing more
    /// leaves its queue and the arena.
    ///
    /// # Panics
    ///
    /// If no unit was in flight.
    pub fn arrive(&mut self, id: RequestId) -> Result<(), RouterError> {
        self.request_mut(id)?.record_arrival();
        self.retire_if_finished(id);
        Ok(())
    }

    /// A committed unit will not arrive; its need is open again.
    ///
    /// # Panics
    ///
    /// If no unit was in flight.
    pub fn abort(&mut self, id: RequestId) -> Result<(), RouterError> {
        self.request_mut(id)?.record_abort();
        Ok(())
    }

    /// Satisfy up to `amount` units without a delivery. Only uncommitted units
    /// are taken. Returns the number taken. Retires a queued request the same
    /// way [`arrive`](Self::arrive) does.
    pub fn consume(&mut self, id: RequestId, amount: u32) -> Result<u32, RouterError> {
        let taken = self.request_mut(id)?.consume(amount);
        self.retire_if_finished(id);
        Ok(taken)
    }

    fn request_mut(&mut self, id: RequestId) -> Result<&mut MaterialRequest, RouterError> {
        self.requests.get_mut(id).ok_or(RouterError::RequestNotFound(id))
    }

    /// Unqueued requests belong to a building-side stack, which releases them
    /// itself.
    fn retire_if_finished(&mut self, id: RequestId) {
        let Some(request) = self.requests.get(id) else {
            return;
        };
        let Some(queue) = request.queue().filter(|_| request.is_done()) else {
            return;
        };
        if let Some(set) = self.sets.get_mut(queue) {
            set.remove(request.priority(), id);
        }
        self.requests.remove(id);
        tracing::trace!(?id, ?queue, "retired fulfilled request");
    }

    // -- Migration --

    /// Move every request owned by `position` from `src` to `dst`, tier by
    /// tier. Moved requests keep their relative order and go to the back of
    /// `dst`; requests left in `src` keep theirs. Returns the number moved.
    pub fn move_requests_at(
        &mut self,
        position: GridPosition,
        src: QueueSetId,
        dst: QueueSetId,
    ) -> Result<usize, RouterError> {
        let [from, to] = disjoint_sets(&mut self.sets, src, dst)?;
        let taken = from.take_at(position, &self.requests);

        let mut moved = 0;
        for (priority, ids) in Priority::ALL.into_iter().zip(taken) {
            for &id in &ids {
                if let Some(request) = self.requests.get_mut(id) {
                    request.set_queue(Some(dst));
                }
            }
            moved += ids.len();
            to.extend_tier(priority, ids);
        }

        tracing::debug!(?src, ?dst, %position, moved, "moved requests between queue sets");
        Ok(moved)
    }

    /// Append every tier of `src` to the same tier of `dst`, leaving `src`
    /// empty. Returns the number of requests moved.
    pub fn merge_all(&mut self, src: QueueSetId, dst: QueueSetId) -> Result<usize, RouterError> {
        let [from, to] = disjoint_sets(&mut self.sets, src, dst)?;
        let moved = from.len();
        for (_, id) in from.iter() {
            if let Some(request) = self.requests.get_mut(id) {
                request.set_queue(Some(dst));
            }
        }
        to.splice_from(from);

        tracing::debug!(?src, ?dst, moved, "merged queue sets");
        Ok(moved)
    }

    // -- Display --

    /// Move a queued request to `desired` within its tier, clamped to the tier
    /// bounds. Returns the index it ended up at.
    pub fn reposition(&mut self, set: QueueSetId, id: RequestId, desired: usize) -> Result<usize, RouterError> {
        let request = self.requests.get(id).ok_or(RouterError::RequestNotFound(id))?;
        if request.queue() != Some(set) {
            return Err(RouterError::NotQueued { request: id, queue: set });
        }
        let queue_set = self.sets.get_mut(set).ok_or(RouterError::QueueSetNotFound(set))?;
        queue_set
            .reposition(request.priority(), id, desired)
            .ok_or(RouterError::NotQueued { request: id, queue: set })
    }

    /// Materials of one tier in queue order.
    pub fn material_order(&self, set: QueueSetId, priority: Priority) -> Result<Vec<MaterialType>, RouterError> {
        let queue_set = self.sets.get(set).ok_or(RouterError::QueueSetNotFound(set))?;
        Ok(queue_set.material_order(priority, &self.requests))
    }

    /// Owned copy of a queue set's current order.
    pub fn snapshot(&self, set: QueueSetId) -> Result<QueueSetSnapshot, RouterError> {
        let queue_set = self.sets.get(set).ok_or(RouterError::QueueSetNotFound(set))?;
        let tiers = Priority::ALL.map(|p| {
            queue_set
                .tier(p)
                .iter()
                .filter_map(|&id| {
                    self.requests.get(id).map(|r| RequestSnapshot {
                        id,
                        position: r.position(),
                        material: r.material(),
                        still_needed: r.still_needed(),
                        in_delivery: r.in_delivery(),
                        round_robin: r.is_round_robin(),
                    })
                })
                .collect::<Vec<_>>()
        });
        Ok(QueueSetSnapshot { id: set, tiers })
    }

    // -- Invariants --

    /// Check every structural invariant: each queued handle resolves, no
    /// request sits in two queues, back-references match the holder, tiers
    /// match priorities and nothing is over-committed.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let mut holder: SecondaryMap<RequestId, QueueSetId> = SecondaryMap::new();
        for (set_id, set) in &self.sets {
            for (tier, id) in set.iter() {
                let request = self.requests.get(id).ok_or(InvariantViolation::DanglingHandle {
                    queue: set_id,
                    request: id,
                })?;
                if let Some(first) = holder.insert(id, set_id) {
                    return Err(InvariantViolation::DuplicateLink {
                        request: id,
                        first,
                        second: set_id,
                    });
                }
                if request.queue() != Some(set_id) {
                    return Err(InvariantViolation::BackReference {
                        request: id,
                        expected: Some(set_id),
                        found: request.queue(),
                    });
                }
                if request.priority() != tier {
                    return Err(InvariantViolation::TierMismatch {
                        request: id,
                        tier,
                        priority: request.priority(),
                    });
                }
            }
        }

        for (id, request) in &self.requests {
            if request.in_delivery() > request.in_deliverable_cap() {
                return Err(InvariantViolation::OverCommitted {
                    request: id,
                    in_delivery: request.in_delivery(),
                    cap: request.in_deliverable_cap(),
                });
            }
            if request.queue().is_some() && !holder.contains_key(id) {
                return Err(InvariantViolation::BackReference {
                    request: id,
                    expected: None,
                    found: request.queue(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn requests_raw(&self) -> &RequestArena {
        &self.requests
    }

    pub(crate) fn sets_raw(&self) -> &SlotMap<QueueSetId, PriorityQueueSet> {
        &self.sets
    }

    /// Rebuild a router from stored parts, re-linking every back-reference
    /// from the queue contents. Either every request is linked or none is:
    /// the router is only returned once the whole structure validates.
    pub(crate) fn from_parts(
        mut requests: RequestArena,
        sets: SlotMap<QueueSetId, PriorityQueueSet>,
        defaults: RequestDefaults,
    ) -> Result<Self, InvariantViolation> {
        for (_, request) in requests.iter_mut() {
            request.set_queue(None);
        }
        for (set_id, set) in &sets {
            for (_, id) in set.iter() {
                let request = requests.get_mut(id).ok_or(InvariantViolation::DanglingHandle {
                    queue: set_id,
                    request: id,
                })?;
                if let Some(first) = request.queue() {
                    return Err(InvariantViolation::DuplicateLink {
                        request: id,
                        first,
                        second: set_id,
                    });
                }
                request.set_queue(Some(set_id));
            }
        }

        let router = Self {
            requests,
            sets,
            defaults,
        };
        router.validate()?;
        Ok(router)
    }
}

fn disjoint_sets(
    sets: &mut SlotMap<QueueSetId, PriorityQueueSet>,
    src: QueueSetId,
    dst: QueueSetId,
) -> Result<[&mut PriorityQueueSet; 2], RouterError> {
    if src == dst {
        return Err(RouterError::SameQueueSet(src));
    }
    for id in [src, dst] {
        if !sets.contains_key(id) {
            return Err(RouterError::QueueSetNotFound(id));
        }
    }
    sets.get_disjoint_mut([src, dst])
        .ok_or(RouterError::SameQueueSet(src))
}
