//! Harbors: buildings that release stored material to ships.
//!
//! A harbor keeps its trade orders on a [`RequestStack`]. Ships do not get
//! units delivered by carriers; they take them straight off the stack, one
//! unit at a time, and every unit taken lowers the underlying request's
//! need through the router.

use crate::id::{MaterialType, PlayerId, RequestId};
use crate::position::GridPosition;
use crate::priority::Priority;
use crate::router::{RequestRouter, RouterError};
use crate::stack::{self, RequestStack};
use crate::waypoint::{WaypointError, Waypoints, WaypointsIter};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MaterialSource
// ---------------------------------------------------------------------------

/// Operational state of a material source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceState {
    /// No destination set.
    Idle,
    /// Destination set and not stopped.
    Active,
    /// Priority stopped, whatever the destination.
    Stopped,
}

/// A building ships can load material from.
pub trait MaterialSource {
    fn state(&self) -> SourceState;

    /// Whether a ship should come: the source is active and its stack has
    /// something to release.
    fn needs_servicing(&self, router: &RequestRouter) -> bool;

    /// Take up to `requested` units of `material`. Stops early when the
    /// stack's current material changes or runs dry. Returns the number
    /// taken; zero when inactive or when `material` is not on top.
    fn try_take_units(&mut self, router: &mut RequestRouter, material: MaterialType, requested: u32) -> u32;

    /// Take one unit of whatever is on top and report its material.
    fn try_take_single_unit(&mut self, router: &mut RequestRouter) -> Option<MaterialType>;

    /// Fresh walk over the ship route.
    fn waypoints_iter(&self) -> WaypointsIter;
}

// ---------------------------------------------------------------------------
// Harbor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Harbor {
    owner: PlayerId,
    position: GridPosition,
    priority: Priority,
    waypoints: Waypoints,
    stack: RequestStack,
}

impl Harbor {
    pub fn new(owner: PlayerId, position: GridPosition) -> Self {
        Self {
            owner,
            position,
            priority: Priority::Low,
            waypoints: Waypoints::new(),
            stack: RequestStack::new(),
        }
    }

    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    pub fn position(&self) -> GridPosition {
        self.position
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn set_priority(&mut self, priority: Priority) {
        if self.priority != priority {
            tracing::debug!(position = %self.position, ?priority, "harbor priority changed");
            self.priority = priority;
        }
    }

    pub fn waypoints(&self) -> &Waypoints {
        &self.waypoints
    }

    pub fn destination(&self) -> Option<GridPosition> {
        self.waypoints.destination()
    }

    pub fn set_destination(&mut self, destination: Option<GridPosition>) {
        tracing::debug!(position = %self.position, ?destination, "harbor destination changed");
        self.waypoints.set_destination(destination);
    }

    pub fn set_waypoint(&mut self, slot: usize, waypoint: Option<GridPosition>) -> Result<(), WaypointError> {
        self.waypoints.set(slot, waypoint)
    }

    /// Forget the whole route, destination included.
    pub fn clear_route(&mut self) {
        self.waypoints.clear();
    }

    pub fn stack(&self) -> &RequestStack {
        &self.stack
    }

    /// Store a trade order of `amount` units and put it on the stack. An
    /// order for nothing is refused.
    pub fn add_trade_request(
        &mut self,
        router: &mut RequestRouter,
        material: MaterialType,
        amount: u32,
        priority: Priority,
    ) -> Result<RequestId, RouterError> {
        if amount == 0 {
            return Err(RouterError::ZeroAmount);
        }
        let request = router
            .new_request(self.position, material, amount)
            .with_priority(priority);
        let id = router.insert(request);
        self.stack.push(id, router)?;
        tracing::debug!(position = %self.position, ?material, amount, "harbor trade request added");
        Ok(id)
    }

    /// Withdraw a trade order. Returns `false` if it was not on this stack.
    pub fn cancel_trade_request(&mut self, router: &mut RequestRouter, id: RequestId) -> bool {
        if !self.stack.remove(id) {
            return false;
        }
        stack::release(router, id);
        true
    }

    /// Release every trade order. The harbor is unusable afterwards.
    pub fn demolish(&mut self, router: &mut RequestRouter) {
        tracing::debug!(position = %self.position, orders = self.stack.len(), "harbor demolished");
        self.stack.release_all(router);
        self.waypoints.clear();
    }
}

impl MaterialSource for Harbor {
    fn state(&self) -> SourceState {
        if self.priority.is_stopped() {
            SourceState::Stopped
        } else if self.waypoints.destination().is_none() {
            SourceState::Idle
        } else {
            SourceState::Active
        }
    }

    fn needs_servicing(&self, router: &RequestRouter) -> bool {
        self.state() == SourceState::Active && self.stack.has_releasable(router)
    }

    fn try_take_units(&mut self, router: &mut RequestRouter, material: MaterialType, requested: u32) -> u32 {
        if self.state() != SourceState::Active {
            return 0;
        }
        self.stack.retire_finished(router);
        let mut taken = 0;
        while taken < requested
            && self.stack.material_type(router) == Some(material)
            && self.stack.pop(router)
        {
            taken += 1;
        }
        if taken > 0 {
            tracing::trace!(position = %self.position, ?material, taken, requested, "units loaded");
        }
        taken
    }

    fn try_take_single_unit(&mut self, router: &mut RequestRouter) -> Option<MaterialType> {
        if self.state() != SourceState::Active {
            return None;
        }
        self.stack.retire_finished(router);
        let material = self.stack.material_type(router)?;
        self.stack.pop(router).then_some(material)
    }

    fn waypoints_iter(&self) -> WaypointsIter {
        self.waypoints.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FISH: MaterialType = MaterialType(7);
    const GOLD: MaterialType = MaterialType(8);

    fn active_harbor() -> Harbor {
        let mut harbor = Harbor::new(PlayerId(0), GridPosition::new(4, 4));
        harbor.set_destination(Some(GridPosition::new(40, 4)));
        harbor
    }

    #[test]
    fn state_follows_priority_and_destination() {
        let mut harbor = Harbor::new(PlayerId(0), GridPosition::new(0, 0));
        assert_eq!(harbor.state(), SourceState::Idle);

        harbor.set_destination(Some(GridPosition::new(9, 9)));
        assert_eq!(harbor.state(), SourceState::Active);

        harbor.set_priority(Priority::Stopped);
        assert_eq!(harbor.state(), SourceState::Stopped);

        harbor.set_destination(None);
        assert_eq!(harbor.state(), SourceState::Stopped);
    }

    #[test]
    fn stopped_harbor_takes_nothing() {
        let mut router = RequestRouter::new();
        let mut harbor = active_harbor();
        harbor.add_trade_request(&mut router, FISH, 4, Priority::Low).unwrap();
        harbor.set_priority(Priority::Stopped);

        assert!(!harbor.needs_servicing(&router));
        assert_eq!(harbor.try_take_units(&mut router, FISH, 3), 0);
        assert_eq!(harbor.try_take_single_unit(&mut router), None);
    }

    #[test]
    fn idle_harbor_takes_nothing() {
        let mut router = RequestRouter::new();
        let mut harbor = Harbor::new(PlayerId(0), GridPosition::new(0, 0));
        harbor.add_trade_request(&mut router, FISH, 4, Priority::Low).unwrap();
        assert_eq!(harbor.try_take_units(&mut router, FISH, 3), 0);
    }

    #[test]
    fn take_units_is_partial_and_stops_at_material_change() {
        let mut router = RequestRouter::new();
        let mut harbor = active_harbor();
        let fish = harbor.add_trade_request(&mut router, FISH, 2, Priority::Low).unwrap();
        harbor.add_trade_request(&mut router, GOLD, 3, Priority::Low).unwrap();

        assert!(harbor.needs_servicing(&router));
        assert_eq!(harbor.try_take_units(&mut router, FISH, 5), 2);
        assert!(router.request(fish).is_none());
        assert_eq!(harbor.try_take_units(&mut router, FISH, 5), 0);
        assert_eq!(harbor.try_take_units(&mut router, GOLD, 2), 2);
        assert_eq!(harbor.try_take_single_unit(&mut router), Some(GOLD));
        assert_eq!(harbor.try_take_single_unit(&mut router), None);
        assert!(!harbor.needs_servicing(&router));
    }

    #[test]
    fn high_priority_orders_are_served_first() {
        let mut router = RequestRouter::new();
        let mut harbor = active_harbor();
        harbor.add_trade_request(&mut router, FISH, 1, Priority::Low).unwrap();
        harbor.add_trade_request(&mut router, GOLD, 1, Priority::High).unwrap();
        assert_eq!(harbor.try_take_single_unit(&mut router), Some(GOLD));
        assert_eq!(harbor.try_take_single_unit(&mut router), Some(FISH));
    }

    #[test]
    fn retiered_order_is_loaded_first() {
        let mut router = RequestRouter::new();
        let mut harbor = active_harbor();
        harbor.add_trade_request(&mut router, FISH, 1, Priority::Low).unwrap();
        let gold = harbor.add_trade_request(&mut router, GOLD, 1, Priority::Low).unwrap();

        router.set_priority(gold, Priority::High).unwrap();
        assert_eq!(harbor.try_take_single_unit(&mut router), Some(GOLD));
        assert_eq!(harbor.try_take_single_unit(&mut router), Some(FISH));
    }

    #[test]
    fn empty_orders_are_refused() {
        let mut router = RequestRouter::new();
        let mut harbor = active_harbor();
        assert_eq!(
            harbor.add_trade_request(&mut router, FISH, 0, Priority::Low),
            Err(RouterError::ZeroAmount)
        );
        assert!(harbor.stack().is_empty());
        assert_eq!(router.request_count(), 0);
    }

    #[test]
    fn orders_finished_elsewhere_are_released_on_load() {
        let mut router = RequestRouter::new();
        let mut harbor = active_harbor();
        let fish = harbor.add_trade_request(&mut router, FISH, 1, Priority::High).unwrap();
        harbor.add_trade_request(&mut router, GOLD, 1, Priority::Low).unwrap();
        // The fish unit goes out by carrier instead of by ship.
        router.dispatch(fish).unwrap();
        router.arrive(fish).unwrap();
        assert!(router.request(fish).unwrap().is_done());

        assert_eq!(harbor.try_take_single_unit(&mut router), Some(GOLD));
        assert!(harbor.stack().is_empty());
        assert_eq!(router.request_count(), 0);
    }

    #[test]
    fn cancel_and_demolish_release_requests() {
        let mut router = RequestRouter::new();
        let mut harbor = active_harbor();
        let fish = harbor.add_trade_request(&mut router, FISH, 2, Priority::Low).unwrap();
        harbor.add_trade_request(&mut router, GOLD, 2, Priority::Low).unwrap();

        assert!(harbor.cancel_trade_request(&mut router, fish));
        assert!(!harbor.cancel_trade_request(&mut router, fish));
        assert_eq!(router.request_count(), 1);

        harbor.demolish(&mut router);
        assert_eq!(router.request_count(), 0);
        assert!(harbor.stack().is_empty());
        assert_eq!(harbor.state(), SourceState::Idle);
    }

    #[test]
    fn route_includes_waypoints_before_destination() {
        let mut harbor = active_harbor();
        harbor.set_waypoint(1, Some(GridPosition::new(20, 10))).unwrap();
        assert_eq!(
            harbor.waypoints_iter().collect::<Vec<_>>(),
            vec![GridPosition::new(20, 10), GridPosition::new(40, 4)]
        );
        harbor.clear_route();
        assert_eq!(harbor.waypoints_iter().next(), None);
    }
}
