//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::harbor::Harbor;
use crate::id::*;
use crate::position::GridPosition;
use crate::priority::Priority;
use crate::request::MaterialRequest;
use crate::router::RequestRouter;

pub fn pos(x: i16, y: i16) -> GridPosition {
    GridPosition::new(x, y)
}

// ===========================================================================
// Material constructors
// ===========================================================================

pub fn plank() -> MaterialType {
    MaterialType(0)
}
pub fn stone() -> MaterialType {
    MaterialType(1)
}
pub fn trunk() -> MaterialType {
    MaterialType(2)
}
pub fn fish() -> MaterialType {
    MaterialType(3)
}
pub fn gold() -> MaterialType {
    MaterialType(4)
}

// ===========================================================================
// Router setup
// ===========================================================================

/// A router with one empty queue set.
pub fn router_with_set() -> (RequestRouter, QueueSetId) {
    let mut router = RequestRouter::new();
    let set = router.create_queue_set();
    (router, set)
}

/// Register `amount` units of `material` needed at `position`.
pub fn request_at(
    router: &mut RequestRouter,
    set: QueueSetId,
    position: GridPosition,
    material: MaterialType,
    amount: u32,
) -> RequestId {
    router
        .register(set, MaterialRequest::new(position, material, amount))
        .expect("queue set exists")
}

/// Register one request per x coordinate on row 0, all in the low tier.
pub fn fill_tier(router: &mut RequestRouter, set: QueueSetId, count: usize, round_robin: bool) -> Vec<RequestId> {
    (0..count)
        .map(|x| {
            let request = MaterialRequest::new(pos(x as i16, 0), plank(), 10).with_round_robin(round_robin);
            router.register(set, request).expect("queue set exists")
        })
        .collect()
}

/// Handles of one tier in queue order.
pub fn tier_ids(router: &RequestRouter, set: QueueSetId, priority: Priority) -> Vec<RequestId> {
    router
        .queue_set(set)
        .map(|s| s.tier(priority).iter().copied().collect())
        .unwrap_or_default()
}

/// An active harbor at `position` with a destination to the east.
pub fn active_harbor(owner: u8, position: GridPosition) -> Harbor {
    let mut harbor = Harbor::new(PlayerId(owner), position);
    harbor.set_destination(Some(pos(position.x + 40, position.y)));
    harbor
}
