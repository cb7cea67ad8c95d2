//! Material requests: one consumer's outstanding need for one material.
//!
//! A request tracks two counters. `still_needed` counts units that have not
//! arrived yet, including units already on their way. `in_delivery` counts the
//! units on their way. The router is the only writer of both counters and of
//! the queue back-reference; everything else reads.

use crate::id::{BuildingTypeId, MaterialType, QueueSetId};
use crate::position::GridPosition;
use crate::priority::Priority;
use serde::{Deserialize, Serialize};

/// Units a request accepts in flight unless configured otherwise.
pub const DEFAULT_IN_DELIVERABLE_CAP: u32 = 8;

/// Defaults applied to newly registered requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDefaults {
    pub in_deliverable_cap: u32,
    pub round_robin: bool,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            in_deliverable_cap: DEFAULT_IN_DELIVERABLE_CAP,
            round_robin: false,
        }
    }
}

/// A consumer's need for units of a single material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRequest {
    position: GridPosition,
    material: MaterialType,
    priority: Priority,
    building_type: Option<BuildingTypeId>,
    still_needed: u32,
    in_delivery: u32,
    in_deliverable_cap: u32,
    round_robin: bool,
    /// Queue set currently holding this request. Rebuilt on restore.
    #[serde(skip)]
    queue: Option<QueueSetId>,
}

impl MaterialRequest {
    pub fn new(position: GridPosition, material: MaterialType, amount: u32) -> Self {
        Self::with_defaults(position, material, amount, &RequestDefaults::default())
    }

    pub fn with_defaults(
        position: GridPosition,
        material: MaterialType,
        amount: u32,
        defaults: &RequestDefaults,
    ) -> Self {
        Self {
            position,
            material,
            priority: Priority::default(),
            building_type: None,
            still_needed: amount,
            in_delivery: 0,
            in_deliverable_cap: defaults.in_deliverable_cap,
            round_robin: defaults.round_robin,
            queue: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_in_deliverable_cap(mut self, cap: u32) -> Self {
        self.in_deliverable_cap = cap;
        self
    }

    pub fn with_round_robin(mut self, round_robin: bool) -> Self {
        self.round_robin = round_robin;
        self
    }

    pub fn for_building(mut self, building_type: BuildingTypeId) -> Self {
        self.building_type = Some(building_type);
        self
    }

    // -- Accessors --

    pub fn position(&self) -> GridPosition {
        self.position
    }

    pub fn material(&self) -> MaterialType {
        self.material
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn building_type(&self) -> Option<BuildingTypeId> {
        self.building_type
    }

    pub fn still_needed(&self) -> u32 {
        self.still_needed
    }

    pub fn in_delivery(&self) -> u32 {
        self.in_delivery
    }

    pub fn in_deliverable_cap(&self) -> u32 {
        self.in_deliverable_cap
    }

    pub fn is_round_robin(&self) -> bool {
        self.round_robin
    }

    /// Queue set currently holding this request, if any.
    pub fn queue(&self) -> Option<QueueSetId> {
        self.queue
    }

    /// Nothing left to deliver. A done request is inert.
    pub fn is_done(&self) -> bool {
        self.still_needed == 0
    }

    /// Units that are needed and not yet covered by a delivery in flight.
    pub fn uncommitted(&self) -> u32 {
        self.still_needed.saturating_sub(self.in_delivery)
    }

    /// Whether a carrier may commit one more unit to this request right now.
    pub fn accepts_delivery(&self) -> bool {
        self.still_needed > self.in_delivery && self.in_delivery < self.in_deliverable_cap
    }

    // -- Mutation (router only) --

    pub(crate) fn set_queue(&mut self, queue: Option<QueueSetId>) {
        self.queue = queue;
    }

    pub(crate) fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub(crate) fn record_dispatch(&mut self) {
        assert!(
            self.in_delivery < self.in_deliverable_cap,
            "dispatch would exceed in-deliverable cap ({} in flight, cap {})",
            self.in_delivery,
            self.in_deliverable_cap
        );
        assert!(
            self.in_delivery < self.still_needed,
            "dispatch would commit more units than still needed ({} in flight, {} needed)",
            self.in_delivery,
            self.still_needed
        );
        self.in_delivery += 1;
    }

    pub(crate) fn record_arrival(&mut self) {
        assert!(self.in_delivery > 0, "arrival without a delivery in flight");
        self.in_delivery -= 1;
        self.still_needed -= 1;
    }

    pub(crate) fn record_abort(&mut self) {
        assert!(self.in_delivery > 0, "abort without a delivery in flight");
        self.in_delivery -= 1;
    }

    /// Take up to `amount` uncommitted units out of the need. Returns the
    /// number taken. Units in flight are never consumed.
    pub(crate) fn consume(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.uncommitted());
        self.still_needed -= taken;
        taken
    }
}
