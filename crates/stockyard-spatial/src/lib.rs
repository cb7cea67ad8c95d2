//! Partition management: which queue sets serve which tiles.
//!
//! A partition is a connected piece of one player's territory. It owns one
//! queue set per material and its own material distribution order. Every
//! tile maps to at most one partition; requests posted from a tile go into
//! that partition's queue for the requested material.
//!
//! When territory changes hands, the requests of the affected tiles follow
//! the tile: reassigning a tile moves its requests, and merging two
//! partitions splices every queue of the absorbed one onto the survivor.

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use std::collections::{BTreeMap, BTreeSet};
use stockyard_core::id::{MaterialType, PlayerId, QueueSetId, RequestId};
use stockyard_core::ordering::{MaterialPriorities, PriorityCommand, PriorityError};
use stockyard_core::position::GridPosition;
use stockyard_core::query::QueueSetSnapshot;
use stockyard_core::request::MaterialRequest;
use stockyard_core::router::RouterError;
use stockyard_core::shared::SharedRouter;

new_key_type! {
    /// Identifies a partition in the partition manager.
    pub struct PartitionId;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpatialError {
    #[error("partition not found: {0:?}")]
    PartitionNotFound(PartitionId),
    #[error("cannot merge partition {0:?} into itself")]
    SamePartition(PartitionId),
    #[error("partitions {from:?} and {into:?} belong to different players")]
    OwnerMismatch { from: PartitionId, into: PartitionId },
    #[error("position {0} is not part of any partition")]
    Unassigned(GridPosition),
    #[error("queue set {0:?} is claimed by more than one partition")]
    SharedQueue(QueueSetId),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error(transparent)]
    Priority(#[from] PriorityError),
}

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    owner: PlayerId,
    /// Created on first use of a material.
    queues: BTreeMap<MaterialType, QueueSetId>,
    priorities: MaterialPriorities,
}

impl Partition {
    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    pub fn queue(&self, material: MaterialType) -> Option<QueueSetId> {
        self.queues.get(&material).copied()
    }

    pub fn queues(&self) -> impl Iterator<Item = (MaterialType, QueueSetId)> + '_ {
        self.queues.iter().map(|(&m, &q)| (m, q))
    }

    pub fn priorities(&self) -> &MaterialPriorities {
        &self.priorities
    }
}

// ---------------------------------------------------------------------------
// PartitionLayout
// ---------------------------------------------------------------------------

/// Everything a partition manager knows besides the router: partitions,
/// tile ownership and the priorities new partitions start with. Saved next
/// to a router snapshot and restored against the router it was taken with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionLayout {
    partitions: SlotMap<PartitionId, Partition>,
    tiles: Vec<(GridPosition, PartitionId)>,
    default_priorities: MaterialPriorities,
}

impl PartitionLayout {
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

// ---------------------------------------------------------------------------
// PartitionManager
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct PartitionManager {
    router: SharedRouter,
    partitions: SlotMap<PartitionId, Partition>,
    tiles: BTreeMap<GridPosition, PartitionId>,
    default_priorities: MaterialPriorities,
}

impl PartitionManager {
    /// New partitions start with a copy of `default_priorities`.
    pub fn new(router: SharedRouter, default_priorities: MaterialPriorities) -> Self {
        Self {
            router,
            partitions: SlotMap::with_key(),
            tiles: BTreeMap::new(),
            default_priorities,
        }
    }

    /// Rebuild a manager from a saved layout. Every queue set the layout
    /// names must exist in `router` and belong to exactly one partition,
    /// and every tile must point at a known partition.
    pub fn restore(router: SharedRouter, layout: PartitionLayout) -> Result<Self, SpatialError> {
        let mut claimed = BTreeSet::new();
        for (_, partition) in &layout.partitions {
            for (_, queue) in partition.queues() {
                if !claimed.insert(queue) {
                    return Err(SpatialError::SharedQueue(queue));
                }
                if !router.read(|r| r.contains_queue_set(queue)) {
                    return Err(RouterError::QueueSetNotFound(queue).into());
                }
            }
        }
        let mut tiles = BTreeMap::new();
        for (position, partition) in layout.tiles {
            if !layout.partitions.contains_key(partition) {
                return Err(SpatialError::PartitionNotFound(partition));
            }
            tiles.insert(position, partition);
        }

        tracing::info!(
            partitions = layout.partitions.len(),
            tiles = tiles.len(),
            "restored partition layout"
        );
        Ok(Self {
            router,
            partitions: layout.partitions,
            tiles,
            default_priorities: layout.default_priorities,
        })
    }

    /// Owned copy of the layout for saving alongside the router.
    pub fn layout(&self) -> PartitionLayout {
        PartitionLayout {
            partitions: self.partitions.clone(),
            tiles: self.tiles.iter().map(|(&pos, &id)| (pos, id)).collect(),
            default_priorities: self.default_priorities.clone(),
        }
    }

    pub fn router(&self) -> &SharedRouter {
        &self.router
    }

    // -- Partitions and tiles --

    pub fn create_partition(&mut self, owner: PlayerId) -> PartitionId {
        self.partitions.insert(Partition {
            owner,
            queues: BTreeMap::new(),
            priorities: self.default_priorities.clone(),
        })
    }

    pub fn partition(&self, id: PartitionId) -> Option<&Partition> {
        self.partitions.get(id)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn partition_at(&self, position: GridPosition) -> Option<PartitionId> {
        self.tiles.get(&position).copied()
    }

    pub fn tiles_of(&self, id: PartitionId) -> impl Iterator<Item = GridPosition> + '_ {
        self.tiles
            .iter()
            .filter(move |&(_, &owner)| owner == id)
            .map(|(&pos, _)| pos)
    }

    /// Hand a tile to `partition`. Requests posted from the tile move with
    /// it, material by material, to the back of the new partition's queues.
    /// Returns the number of requests moved.
    pub fn assign(&mut self, position: GridPosition, partition: PartitionId) -> Result<usize, SpatialError> {
        if !self.partitions.contains_key(partition) {
            return Err(SpatialError::PartitionNotFound(partition));
        }
        let previous = self.tiles.insert(position, partition);
        let Some(previous) = previous.filter(|&p| p != partition) else {
            return Ok(0);
        };

        let sources: Vec<(MaterialType, QueueSetId)> = self
            .partitions
            .get(previous)
            .map(|p| p.queues().collect())
            .unwrap_or_default();
        let mut pairs = Vec::with_capacity(sources.len());
        for (material, src) in sources {
            pairs.push((src, self.ensure_queue(partition, material)?));
        }

        let moved = self.router.write(|router| {
            pairs.iter().try_fold(0, |total, &(src, dst)| {
                Ok::<_, RouterError>(total + router.move_requests_at(position, src, dst)?)
            })
        })?;

        tracing::debug!(%position, ?previous, ?partition, moved, "tile reassigned");
        Ok(moved)
    }

    /// Absorb `from` into `into`: every queue of `from` is appended to the
    /// matching queue of `into`, every tile of `from` is reassigned, and
    /// `from` is removed. Returns the number of requests moved.
    pub fn merge(&mut self, from: PartitionId, into: PartitionId) -> Result<usize, SpatialError> {
        if from == into {
            return Err(SpatialError::SamePartition(from));
        }
        let source = self.partitions.get(from).ok_or(SpatialError::PartitionNotFound(from))?;
        let target = self.partitions.get(into).ok_or(SpatialError::PartitionNotFound(into))?;
        if source.owner != target.owner {
            return Err(SpatialError::OwnerMismatch { from, into });
        }

        let sources: Vec<(MaterialType, QueueSetId)> = source.queues().collect();
        let mut pairs = Vec::with_capacity(sources.len());
        for (material, src) in sources {
            pairs.push((src, self.ensure_queue(into, material)?));
        }

        let moved = self.router.write(|router| {
            pairs.iter().try_fold(0, |total, &(src, dst)| {
                let moved = router.merge_all(src, dst)?;
                router.remove_queue_set(src)?;
                Ok::<_, RouterError>(total + moved)
            })
        })?;

        let mut tiles = 0;
        for owner in self.tiles.values_mut().filter(|owner| **owner == from) {
            *owner = into;
            tiles += 1;
        }
        self.partitions.remove(from);

        tracing::info!(?from, ?into, moved, tiles, "merged partitions");
        Ok(moved)
    }

    fn ensure_queue(&mut self, partition: PartitionId, material: MaterialType) -> Result<QueueSetId, SpatialError> {
        let entry = self
            .partitions
            .get_mut(partition)
            .ok_or(SpatialError::PartitionNotFound(partition))?;
        if let Some(&queue) = entry.queues.get(&material) {
            return Ok(queue);
        }
        let queue = self.router.write(|router| router.create_queue_set());
        entry.queues.insert(material, queue);
        Ok(queue)
    }

    // -- Requests --

    /// Post a request built with the router's defaults from the tile at
    /// `position`.
    pub fn request(
        &mut self,
        position: GridPosition,
        material: MaterialType,
        amount: u32,
    ) -> Result<RequestId, SpatialError> {
        let request = self
            .router
            .read(|router| router.new_request(position, material, amount));
        self.register(request)
    }

    /// Queue `request` in the partition that owns its position.
    pub fn register(&mut self, request: MaterialRequest) -> Result<RequestId, SpatialError> {
        let position = request.position();
        let partition = self
            .partition_at(position)
            .ok_or(SpatialError::Unassigned(position))?;
        let queue = self.ensure_queue(partition, request.material())?;
        Ok(self.router.write(|router| router.register(queue, request))?)
    }

    /// Next request of one material a carrier in `partition` should serve.
    pub fn next_request(
        &self,
        partition: PartitionId,
        material: MaterialType,
    ) -> Result<Option<RequestId>, SpatialError> {
        let entry = self
            .partitions
            .get(partition)
            .ok_or(SpatialError::PartitionNotFound(partition))?;
        let Some(queue) = entry.queue(material) else {
            return Ok(None);
        };
        Ok(self.router.write(|router| router.select_best(queue))?)
    }

    /// Next job for an idle carrier: materials are tried in the partition's
    /// distribution order and the first servable request wins.
    pub fn next_job(&self, partition: PartitionId) -> Result<Option<(MaterialType, RequestId)>, SpatialError> {
        let entry = self
            .partitions
            .get(partition)
            .ok_or(SpatialError::PartitionNotFound(partition))?;
        let queues: Vec<(MaterialType, QueueSetId)> = entry
            .priorities
            .order()
            .iter()
            .filter_map(|&material| entry.queue(material).map(|queue| (material, queue)))
            .collect();

        let job = self.router.write(|router| -> Result<_, RouterError> {
            for (material, queue) in queues {
                if let Some(id) = router.select_best(queue)? {
                    return Ok(Some((material, id)));
                }
            }
            Ok(None)
        })?;
        Ok(job)
    }

    // -- Settings and display --

    pub fn apply_priority_command(
        &mut self,
        partition: PartitionId,
        command: PriorityCommand,
    ) -> Result<(), SpatialError> {
        let entry = self
            .partitions
            .get_mut(partition)
            .ok_or(SpatialError::PartitionNotFound(partition))?;
        tracing::debug!(?partition, ?command, "priority command");
        entry.priorities.apply(command)?;
        Ok(())
    }

    /// Distribution order of a partition, first served first.
    pub fn material_order(&self, partition: PartitionId) -> Result<Vec<MaterialType>, SpatialError> {
        self.partitions
            .get(partition)
            .map(|p| p.priorities.order().to_vec())
            .ok_or(SpatialError::PartitionNotFound(partition))
    }

    /// Current queue of one material, or `None` if nothing was ever
    /// requested in this partition.
    pub fn queue_snapshot(
        &self,
        partition: PartitionId,
        material: MaterialType,
    ) -> Result<Option<QueueSetSnapshot>, SpatialError> {
        let entry = self
            .partitions
            .get(partition)
            .ok_or(SpatialError::PartitionNotFound(partition))?;
        match entry.queue(material) {
            Some(queue) => Ok(Some(self.router.snapshot(queue)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockyard_core::harbors::HarborRegistry;
    use stockyard_core::priority::Priority;
    use stockyard_core::test_utils::*;

    fn manager() -> PartitionManager {
        PartitionManager::new(
            SharedRouter::default(),
            MaterialPriorities::new(vec![plank(), stone(), trunk()]),
        )
    }

    fn tier(manager: &PartitionManager, partition: PartitionId, material: MaterialType) -> Vec<RequestId> {
        manager
            .queue_snapshot(partition, material)
            .unwrap()
            .map(|snap| snap.tier(Priority::Low).iter().map(|r| r.id).collect())
            .unwrap_or_default()
    }

    #[test]
    fn requests_go_to_the_tile_partition() {
        let mut m = manager();
        let p = m.create_partition(PlayerId(0));
        m.assign(pos(1, 1), p).unwrap();

        let id = m.request(pos(1, 1), plank(), 3).unwrap();
        assert_eq!(tier(&m, p, plank()), vec![id]);
        assert_eq!(m.next_request(p, plank()).unwrap(), Some(id));
        assert_eq!(m.next_request(p, stone()).unwrap(), None);
    }

    #[test]
    fn request_from_unassigned_tile_fails() {
        let mut m = manager();
        assert_eq!(
            m.request(pos(0, 0), plank(), 1),
            Err(SpatialError::Unassigned(pos(0, 0)))
        );
    }

    #[test]
    fn reassigning_a_tile_moves_its_requests() {
        let mut m = manager();
        let a = m.create_partition(PlayerId(0));
        let b = m.create_partition(PlayerId(0));
        m.assign(pos(0, 0), a).unwrap();
        m.assign(pos(1, 0), a).unwrap();

        let stays = m.request(pos(0, 0), plank(), 1).unwrap();
        let moves = m.request(pos(1, 0), plank(), 1).unwrap();
        let moves_too = m.request(pos(1, 0), stone(), 1).unwrap();

        assert_eq!(m.assign(pos(1, 0), b).unwrap(), 2);
        assert_eq!(m.partition_at(pos(1, 0)), Some(b));
        assert_eq!(tier(&m, a, plank()), vec![stays]);
        assert_eq!(tier(&m, b, plank()), vec![moves]);
        assert_eq!(tier(&m, b, stone()), vec![moves_too]);
        m.router().read(|r| r.validate()).unwrap();

        // Assigning to the current owner is a no-op.
        assert_eq!(m.assign(pos(1, 0), b).unwrap(), 0);
    }

    #[test]
    fn merge_splices_queues_and_reassigns_tiles() {
        let mut m = manager();
        let a = m.create_partition(PlayerId(0));
        let b = m.create_partition(PlayerId(0));
        m.assign(pos(0, 0), a).unwrap();
        m.assign(pos(5, 5), b).unwrap();
        let b1 = m.request(pos(5, 5), plank(), 1).unwrap();
        let a1 = m.request(pos(0, 0), plank(), 1).unwrap();
        let a2 = m.request(pos(0, 0), trunk(), 1).unwrap();

        assert_eq!(m.merge(a, b).unwrap(), 2);
        assert!(m.partition(a).is_none());
        assert_eq!(m.partition_at(pos(0, 0)), Some(b));
        assert_eq!(tier(&m, b, plank()), vec![b1, a1]);
        assert_eq!(tier(&m, b, trunk()), vec![a2]);
        assert_eq!(m.tiles_of(b).count(), 2);
        // Only the survivor's queue sets remain.
        assert_eq!(m.router().read(|r| r.queue_sets().count()), 2);
        m.router().read(|r| r.validate()).unwrap();
    }

    #[test]
    fn merge_rejects_self_and_foreign_partitions() {
        let mut m = manager();
        let a = m.create_partition(PlayerId(0));
        let enemy = m.create_partition(PlayerId(1));
        assert_eq!(m.merge(a, a), Err(SpatialError::SamePartition(a)));
        assert_eq!(
            m.merge(a, enemy),
            Err(SpatialError::OwnerMismatch { from: a, into: enemy })
        );
    }

    #[test]
    fn next_job_follows_distribution_order() {
        let mut m = manager();
        let p = m.create_partition(PlayerId(0));
        m.assign(pos(0, 0), p).unwrap();
        let trunk_req = m.request(pos(0, 0), trunk(), 1).unwrap();
        let stone_req = m.request(pos(0, 0), stone(), 1).unwrap();

        assert_eq!(m.next_job(p).unwrap(), Some((stone(), stone_req)));
        m.apply_priority_command(p, PriorityCommand::all_up(trunk())).unwrap();
        assert_eq!(m.material_order(p).unwrap(), vec![trunk(), plank(), stone()]);
        assert_eq!(m.next_job(p).unwrap(), Some((trunk(), trunk_req)));
    }

    #[test]
    fn layout_restores_against_a_restored_router() {
        let mut m = manager();
        let a = m.create_partition(PlayerId(0));
        let b = m.create_partition(PlayerId(0));
        m.assign(pos(0, 0), a).unwrap();
        m.assign(pos(3, 3), b).unwrap();
        let plank_req = m.request(pos(0, 0), plank(), 2).unwrap();
        let trunk_req = m.request(pos(0, 0), trunk(), 1).unwrap();
        let other = m.request(pos(3, 3), stone(), 1).unwrap();
        m.apply_priority_command(a, PriorityCommand::all_up(trunk())).unwrap();

        let bytes = m
            .router()
            .read(|r| stockyard_core::serialize::serialize(r, &HarborRegistry::new(), 5))
            .unwrap();
        let layout_bytes = bitcode::serialize(&m.layout()).unwrap();

        let restored = stockyard_core::serialize::deserialize(&bytes).unwrap();
        let layout: PartitionLayout = bitcode::deserialize(&layout_bytes).unwrap();
        assert_eq!(layout.partition_count(), 2);
        assert_eq!(layout.tile_count(), 2);
        let mut back = PartitionManager::restore(SharedRouter::new(restored.router), layout).unwrap();

        assert_eq!(back.partition_at(pos(3, 3)), Some(b));
        assert_eq!(back.material_order(a).unwrap(), vec![trunk(), plank(), stone()]);
        assert_eq!(back.next_job(a).unwrap(), Some((trunk(), trunk_req)));
        assert_eq!(back.next_job(b).unwrap(), Some((stone(), other)));
        assert_eq!(tier(&back, a, plank()), vec![plank_req]);

        // New requests land in the restored queues.
        let again = back.request(pos(0, 0), plank(), 1).unwrap();
        assert_eq!(tier(&back, a, plank()), vec![plank_req, again]);
        back.router().read(|r| r.validate()).unwrap();
    }

    #[test]
    fn layout_restore_rejects_a_foreign_router() {
        let mut m = manager();
        let p = m.create_partition(PlayerId(0));
        m.assign(pos(0, 0), p).unwrap();
        m.request(pos(0, 0), plank(), 1).unwrap();
        let queue = m.partition(p).unwrap().queue(plank()).unwrap();

        let err = PartitionManager::restore(SharedRouter::default(), m.layout()).unwrap_err();
        assert_eq!(err, SpatialError::Router(RouterError::QueueSetNotFound(queue)));
    }

    #[test]
    fn priority_commands_are_per_partition() {
        let mut m = manager();
        let a = m.create_partition(PlayerId(0));
        let b = m.create_partition(PlayerId(0));
        m.apply_priority_command(a, PriorityCommand::one_down(plank())).unwrap();
        assert_eq!(m.material_order(a).unwrap(), vec![stone(), plank(), trunk()]);
        assert_eq!(m.material_order(b).unwrap(), vec![plank(), stone(), trunk()]);

        let unknown = MaterialType(99);
        assert_eq!(
            m.apply_priority_command(a, PriorityCommand::one_up(unknown)),
            Err(SpatialError::Priority(PriorityError::UnknownMaterial(unknown)))
        );
    }
}
