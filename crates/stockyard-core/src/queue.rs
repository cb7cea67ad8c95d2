//! Tiered FIFO queues with round-robin fairness.
//!
//! A [`PriorityQueueSet`] holds one FIFO queue per [`Priority`] tier. The set
//! stores handles only; the requests themselves live in the router's arena,
//! which is passed in to every operation that has to look at them.

use crate::id::{MaterialType, RequestId};
use crate::position::GridPosition;
use crate::priority::Priority;
use crate::request::MaterialRequest;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::VecDeque;

/// Arena holding every request known to a router.
pub type RequestArena = SlotMap<RequestId, MaterialRequest>;

/// One FIFO queue per priority tier.
///
/// Two sets compare equal iff every tier holds the same requests in the same
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityQueueSet {
    tiers: [VecDeque<RequestId>; Priority::COUNT],
}

impl PriorityQueueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The queue of a single tier, front first.
    pub fn tier(&self, priority: Priority) -> &VecDeque<RequestId> {
        &self.tiers[priority.index()]
    }

    /// Total number of queued requests across all tiers.
    pub fn len(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(VecDeque::is_empty)
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.tiers.iter().any(|q| q.contains(&id))
    }

    /// All queued handles with their tier, lowest tier index first.
    pub fn iter(&self) -> impl Iterator<Item = (Priority, RequestId)> + '_ {
        Priority::ALL
            .into_iter()
            .flat_map(move |p| self.tiers[p.index()].iter().map(move |&id| (p, id)))
    }

    /// Material of every request in a tier, front first. Handles missing from
    /// the arena are skipped.
    pub fn material_order(&self, priority: Priority, arena: &RequestArena) -> Vec<MaterialType> {
        self.tier(priority)
            .iter()
            .filter_map(|id| arena.get(*id).map(MaterialRequest::material))
            .collect()
    }

    pub(crate) fn push_back(&mut self, priority: Priority, id: RequestId) {
        self.tiers[priority.index()].push_back(id);
    }

    pub(crate) fn remove(&mut self, priority: Priority, id: RequestId) -> bool {
        let queue = &mut self.tiers[priority.index()];
        match queue.iter().position(|&queued| queued == id) {
            Some(index) => {
                queue.remove(index);
                true
            }
            None => false,
        }
    }

    /// Pick the next servable request of one tier.
    ///
    /// Scans at most as many entries as the tier held on entry. Finished
    /// requests met on the way leave the tier and the arena; they shrink the scan
    /// budget instead of consuming it. Requests that cannot take another
    /// delivery right now rotate to the back. A selected round-robin request
    /// also rotates to the back before it is returned. The stopped tier is
    /// never served.
    pub(crate) fn select(&mut self, priority: Priority, arena: &mut RequestArena) -> Option<RequestId> {
        if priority.is_stopped() {
            return None;
        }
        let queue = &mut self.tiers[priority.index()];
        let mut budget = queue.len();
        let mut examined = 0;

        while examined < budget {
            let &id = queue.front()?;
            let Some(request) = arena.get_mut(id) else {
                tracing::warn!(?id, "dropping stale request handle from queue");
                queue.pop_front();
                budget -= 1;
                continue;
            };

            if request.is_done() {
                queue.pop_front();
                arena.remove(id);
                budget -= 1;
                tracing::trace!(?id, "retired finished request");
            } else if !request.accepts_delivery() {
                queue.rotate_left(1);
                examined += 1;
            } else {
                if request.is_round_robin() {
                    queue.rotate_left(1);
                }
                return Some(id);
            }
        }

        None
    }

    /// Remove every request located at `position`, tier by tier. Relative
    /// order is kept both in the extracted lists and in what stays behind.
    pub(crate) fn take_at(
        &mut self,
        position: GridPosition,
        arena: &RequestArena,
    ) -> [Vec<RequestId>; Priority::COUNT] {
        let mut taken: [Vec<RequestId>; Priority::COUNT] = Default::default();
        for (queue, out) in self.tiers.iter_mut().zip(taken.iter_mut()) {
            let (moved, kept): (VecDeque<RequestId>, VecDeque<RequestId>) = queue
                .drain(..)
                .partition(|id| arena.get(*id).is_some_and(|r| r.position() == position));
            *queue = kept;
            *out = moved.into();
        }
        taken
    }

    pub(crate) fn extend_tier(&mut self, priority: Priority, ids: impl IntoIterator<Item = RequestId>) {
        self.tiers[priority.index()].extend(ids);
    }

    /// Move every tier of `other` onto the end of the same tier here,
    /// leaving `other` empty.
    pub(crate) fn splice_from(&mut self, other: &mut PriorityQueueSet) {
        for (dst, src) in self.tiers.iter_mut().zip(other.tiers.iter_mut()) {
            dst.append(src);
        }
    }

    /// Move `id` to `desired` inside its tier. The index is clamped to the
    /// tier bounds. Returns the resulting index, or `None` if `id` is not in
    /// the tier.
    pub(crate) fn reposition(&mut self, priority: Priority, id: RequestId, desired: usize) -> Option<usize> {
        let queue = &mut self.tiers[priority.index()];
        let old = queue.iter().position(|&queued| queued == id)?;
        let new = desired.min(queue.len() - 1);
        if old != new {
            queue.remove(old);
            queue.insert(new, id);
        }
        Some(new)
    }
}
