use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a material request in the router's request arena.
    pub struct RequestId;

    /// Identifies a priority queue set owned by the router.
    pub struct QueueSetId;

    /// Identifies a harbor in the harbor registry.
    pub struct HarborId;
}

/// Identifies a material type in the registry. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MaterialType(pub u16);

/// Identifies a building template in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingTypeId(pub u16);

/// Identifies a player. Ownership bookkeeping lives outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u8);
