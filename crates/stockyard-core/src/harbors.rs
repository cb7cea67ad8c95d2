//! The set of live harbors in one game world.
//!
//! Owned by the world context and cleared at teardown. Lookups by owner or by
//! predicate return a [`HarborQuery`], which can be walked any number of
//! times.

use crate::harbor::Harbor;
use crate::id::{HarborId, PlayerId};
use crate::router::RequestRouter;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarborRegistry {
    harbors: SlotMap<HarborId, Harbor>,
}

impl HarborRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, harbor: Harbor) -> HarborId {
        self.harbors.insert(harbor)
    }

    /// Unregister a harbor. Its trade orders stay in the router; call
    /// [`Harbor::demolish`] first to release them.
    pub fn remove(&mut self, id: HarborId) -> Option<Harbor> {
        self.harbors.remove(id)
    }

    pub fn get(&self, id: HarborId) -> Option<&Harbor> {
        self.harbors.get(id)
    }

    pub fn get_mut(&mut self, id: HarborId) -> Option<&mut Harbor> {
        self.harbors.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.harbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.harbors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HarborId, &Harbor)> {
        self.harbors.iter()
    }

    /// Harbors matching `filter`.
    pub fn query<F>(&self, filter: F) -> HarborQuery<'_, F>
    where
        F: Fn(&Harbor) -> bool,
    {
        HarborQuery {
            harbors: &self.harbors,
            filter,
        }
    }

    /// Harbors owned by `owner`.
    pub fn of_player(&self, owner: PlayerId) -> HarborQuery<'_, impl Fn(&Harbor) -> bool + Clone> {
        self.query(move |harbor: &Harbor| harbor.owner() == owner)
    }

    /// Demolish every harbor and forget them all.
    pub fn teardown(&mut self, router: &mut RequestRouter) {
        for (_, harbor) in self.harbors.iter_mut() {
            harbor.demolish(router);
        }
        self.harbors.clear();
    }
}

/// A filtered view of the registry. Each call to [`HarborQuery::iter`] starts
/// a new walk.
#[derive(Debug, Clone)]
pub struct HarborQuery<'a, F> {
    harbors: &'a SlotMap<HarborId, Harbor>,
    filter: F,
}

impl<'a, F> HarborQuery<'a, F>
where
    F: Fn(&Harbor) -> bool,
{
    pub fn iter(&self) -> impl Iterator<Item = (HarborId, &'a Harbor)> + '_ {
        self.harbors.iter().filter(|&(_, harbor)| (self.filter)(harbor))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}
