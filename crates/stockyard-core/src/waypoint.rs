//! Ship routes: a fixed row of optional waypoints ending in the destination.

use crate::position::GridPosition;
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;

/// Slots in a route. The last slot is the destination.
pub const WAYPOINT_SLOTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaypointError {
    #[error("waypoint slot {0} out of range (route has {WAYPOINT_SLOTS} slots)")]
    SlotOutOfRange(usize),
    #[error("waypoint iterators are read-only")]
    Unsupported,
}

/// A route of up to [`WAYPOINT_SLOTS`] positions. Unset slots are gaps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoints {
    slots: [Option<GridPosition>; WAYPOINT_SLOTS],
}

impl Waypoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slots(slots: [Option<GridPosition>; WAYPOINT_SLOTS]) -> Self {
        Self { slots }
    }

    pub fn slots(&self) -> &[Option<GridPosition>; WAYPOINT_SLOTS] {
        &self.slots
    }

    pub fn set(&mut self, slot: usize, position: Option<GridPosition>) -> Result<(), WaypointError> {
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(WaypointError::SlotOutOfRange(slot))?;
        *entry = position;
        Ok(())
    }

    /// The final slot.
    pub fn destination(&self) -> Option<GridPosition> {
        self.slots[WAYPOINT_SLOTS - 1]
    }

    pub fn set_destination(&mut self, destination: Option<GridPosition>) {
        self.slots[WAYPOINT_SLOTS - 1] = destination;
    }

    pub fn clear(&mut self) {
        self.slots = [None; WAYPOINT_SLOTS];
    }

    /// A fresh one-shot walk over the set slots.
    pub fn iter(&self) -> WaypointsIter {
        WaypointsIter::new(self.slots)
    }
}

/// One-shot walk over a route, skipping gaps.
///
/// The iterator copies the slots it was built from, so later edits to the
/// route do not affect it. Once exhausted it stays exhausted; build a new one
/// to walk the route again.
#[derive(Debug, Clone)]
pub struct WaypointsIter {
    slots: [Option<GridPosition>; WAYPOINT_SLOTS],
    cursor: usize,
}

impl WaypointsIter {
    fn new(slots: [Option<GridPosition>; WAYPOINT_SLOTS]) -> Self {
        let mut iter = Self { slots, cursor: 0 };
        iter.has_next();
        iter
    }

    /// Whether another waypoint follows. Only moves the cursor past gaps, so
    /// calling it repeatedly has no further effect.
    pub fn has_next(&mut self) -> bool {
        while self.cursor < WAYPOINT_SLOTS && self.slots[self.cursor].is_none() {
            self.cursor += 1;
        }
        self.cursor < WAYPOINT_SLOTS
    }

    /// Routes cannot be edited through an iterator.
    pub fn remove(&mut self) -> Result<(), WaypointError> {
        Err(WaypointError::Unsupported)
    }
}

impl Iterator for WaypointsIter {
    type Item = GridPosition;

    fn next(&mut self) -> Option<GridPosition> {
        if !self.has_next() {
            return None;
        }
        let position = self.slots[self.cursor];
        self.cursor += 1;
        position
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.slots[self.cursor.min(WAYPOINT_SLOTS)..]
            .iter()
            .filter(|slot| slot.is_some())
            .count();
        (remaining, Some(remaining))
    }
}

impl FusedIterator for WaypointsIter {}
