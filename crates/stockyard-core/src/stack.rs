//! A building's own stack of pending requests.
//!
//! Unlike the partition-wide queues, a stack belongs to one building and is
//! served locally: units are popped straight out of the top request instead
//! of being carried to it. The top is the entry with the highest current
//! priority that still has uncommitted need, the earliest pushed among
//! equals, and the stack serves that entry's material only.

use crate::id::{MaterialType, RequestId};
use crate::priority::Priority;
use crate::router::{RequestRouter, RouterError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStack {
    /// Insertion order.
    entries: Vec<RequestId>,
}

impl RequestStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.entries.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = RequestId> + '_ {
        self.entries.iter().copied()
    }

    /// Add a stored request behind every existing entry.
    pub fn push(&mut self, id: RequestId, router: &RequestRouter) -> Result<(), RouterError> {
        if router.request(id).is_none() {
            return Err(RouterError::RequestNotFound(id));
        }
        self.entries.push(id);
        Ok(())
    }

    /// Drop an entry without touching the request. Returns whether it was
    /// present.
    pub fn remove(&mut self, id: RequestId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| *entry != id);
        before != self.entries.len()
    }

    /// The entry units are currently taken from. Priorities are read from
    /// the router on every call, so a re-tiered request moves with its tier.
    pub fn top(&self, router: &RequestRouter) -> Option<RequestId> {
        let mut best: Option<(RequestId, Priority)> = None;
        for &id in &self.entries {
            let Some(request) = router.request(id) else {
                continue;
            };
            let priority = request.priority();
            if priority.is_stopped() || request.uncommitted() == 0 {
                continue;
            }
            if best.is_none_or(|(_, current)| priority > current) {
                best = Some((id, priority));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Material of the top entry.
    pub fn material_type(&self, router: &RequestRouter) -> Option<MaterialType> {
        self.top(router)
            .and_then(|id| router.request(id))
            .map(|r| r.material())
    }

    pub fn has_releasable(&self, router: &RequestRouter) -> bool {
        self.top(router).is_some()
    }

    /// Take one unit from the top entry. Fails when no entry has uncommitted
    /// need. An entry whose need reaches zero is released from the router and
    /// leaves the stack, which may change the stack's material.
    pub fn pop(&mut self, router: &mut RequestRouter) -> bool {
        let Some(id) = self.top(router) else {
            return false;
        };
        match router.consume(id, 1) {
            Ok(1) => {}
            _ => return false,
        }
        if router.request(id).is_some_and(|r| r.is_done()) {
            self.remove(id);
            release(router, id);
        }
        true
    }

    /// Release finished entries and forget entries the router no longer
    /// knows. Returns the number removed.
    pub fn retire_finished(&mut self, router: &mut RequestRouter) -> usize {
        let before = self.entries.len();
        self.entries.retain(|&id| match router.request(id).map(|r| r.is_done()) {
            Some(true) => {
                release(router, id);
                false
            }
            Some(false) => true,
            None => false,
        });
        before - self.entries.len()
    }

    /// Release every entry. Used when the owning building goes away.
    pub fn release_all(&mut self, router: &mut RequestRouter) {
        for id in self.entries.drain(..) {
            release(router, id);
        }
    }
}

pub(crate) fn release(router: &mut RequestRouter, id: RequestId) {
    if let Err(error) = router.release(id) {
        tracing::warn!(?id, %error, "stack held a stale request handle");
    }
}
