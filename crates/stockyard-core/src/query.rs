//! Read-only query API for display layers.
//!
//! Snapshot types are owned copies -- no references into router storage --
//! so a UI thread can hold them after the router lock is released.

use crate::id::{MaterialType, QueueSetId, RequestId};
use crate::position::GridPosition;
use crate::priority::Priority;

// ---------------------------------------------------------------------------
// Request snapshot
// ---------------------------------------------------------------------------

/// A read-only view of a single queued request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    pub id: RequestId,
    pub position: GridPosition,
    pub material: MaterialType,
    pub still_needed: u32,
    pub in_delivery: u32,
    pub round_robin: bool,
}

// ---------------------------------------------------------------------------
// Queue set snapshot
// ---------------------------------------------------------------------------

/// Current order of every tier of one queue set, front first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSetSnapshot {
    pub id: QueueSetId,
    pub tiers: [Vec<RequestSnapshot>; Priority::COUNT],
}

impl QueueSetSnapshot {
    pub fn tier(&self, priority: Priority) -> &[RequestSnapshot] {
        &self.tiers[priority.index()]
    }

    /// Material identifiers of a tier in queue order.
    pub fn materials(&self, priority: Priority) -> Vec<MaterialType> {
        self.tier(priority).iter().map(|r| r.material).collect()
    }

    pub fn len(&self) -> usize {
        self.tiers.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(Vec::is_empty)
    }
}
