//! Per-partition material settings: distribution order and stock acceptance.
//!
//! Carriers in a partition look at materials in distribution order, so a
//! material near the front gets its requests served first. The order is
//! edited through [`PriorityCommand`]s, one per UI action.

use crate::id::MaterialType;
use crate::registry::MaterialRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Largest step a single move command takes. Moving by this much sends a
/// material to the front or the back of any realistic order.
pub const MAX_MOVE_AMOUNT: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriorityError {
    #[error("material {0:?} is not in the distribution order")]
    UnknownMaterial(MaterialType),
    #[error("new order is not a permutation of the current one")]
    NotAPermutation,
}

/// One edit to a partition's material settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriorityCommand {
    /// Move a material to an index, clamped to the order's bounds.
    MoveTo { material: MaterialType, index: usize },
    /// Move a material by a signed number of places. Negative is forward.
    MoveBy { material: MaterialType, delta: i32 },
    /// Replace the whole order.
    SetOrder(Vec<MaterialType>),
    SetStockAccepted { material: MaterialType, accepted: bool },
}

impl PriorityCommand {
    pub fn one_up(material: MaterialType) -> Self {
        Self::MoveBy { material, delta: -1 }
    }

    pub fn one_down(material: MaterialType) -> Self {
        Self::MoveBy { material, delta: 1 }
    }

    pub fn all_up(material: MaterialType) -> Self {
        Self::MoveBy {
            material,
            delta: -MAX_MOVE_AMOUNT,
        }
    }

    pub fn all_down(material: MaterialType) -> Self {
        Self::MoveBy {
            material,
            delta: MAX_MOVE_AMOUNT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialPriorities {
    order: Vec<MaterialType>,
    stock_rejected: BTreeSet<MaterialType>,
}

impl MaterialPriorities {
    /// Settings with the given distribution order. Every material is accepted
    /// into stock.
    pub fn new(order: Vec<MaterialType>) -> Self {
        Self {
            order,
            stock_rejected: BTreeSet::new(),
        }
    }

    /// Default settings: droppable materials in registration order.
    pub fn from_registry(registry: &MaterialRegistry) -> Self {
        Self::new(registry.droppable_materials())
    }

    pub fn order(&self) -> &[MaterialType] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Material at distribution rank `index`, 0 being served first.
    pub fn material_for_prio(&self, index: usize) -> Option<MaterialType> {
        self.order.get(index).copied()
    }

    pub fn index_of(&self, material: MaterialType) -> Option<usize> {
        self.order.iter().position(|&m| m == material)
    }

    /// The order that moving `material` to `desired` would produce. Materials
    /// between the old and the new index shift by one place. Unknown
    /// materials leave the order unchanged.
    pub fn reorder(&self, material: MaterialType, desired: usize) -> Vec<MaterialType> {
        let mut order = self.order.clone();
        if let Some(old) = self.index_of(material) {
            let new = desired.min(order.len() - 1);
            shift(&mut order, old, new);
        }
        order
    }

    /// Move `material` to `desired`, clamped. Returns its new index.
    pub fn move_to(&mut self, material: MaterialType, desired: usize) -> Result<usize, PriorityError> {
        let old = self
            .index_of(material)
            .ok_or(PriorityError::UnknownMaterial(material))?;
        let new = desired.min(self.order.len() - 1);
        shift(&mut self.order, old, new);
        Ok(new)
    }

    /// Move `material` by `delta` places, clamped. Returns its new index.
    pub fn move_by(&mut self, material: MaterialType, delta: i32) -> Result<usize, PriorityError> {
        let old = self
            .index_of(material)
            .ok_or(PriorityError::UnknownMaterial(material))?;
        let delta = delta.clamp(-MAX_MOVE_AMOUNT, MAX_MOVE_AMOUNT);
        let desired = (old as i64 + i64::from(delta)).max(0) as usize;
        self.move_to(material, desired)
    }

    /// Replace the order. The new order must hold exactly the same materials.
    pub fn set_order(&mut self, order: Vec<MaterialType>) -> Result<(), PriorityError> {
        let mut current = self.order.clone();
        let mut proposed = order.clone();
        current.sort_unstable();
        proposed.sort_unstable();
        if current != proposed {
            return Err(PriorityError::NotAPermutation);
        }
        self.order = order;
        Ok(())
    }

    pub fn stock_accepts(&self, material: MaterialType) -> bool {
        !self.stock_rejected.contains(&material)
    }

    pub fn set_stock_accepts(&mut self, material: MaterialType, accepted: bool) {
        if accepted {
            self.stock_rejected.remove(&material);
        } else {
            self.stock_rejected.insert(material);
        }
    }

    pub fn apply(&mut self, command: PriorityCommand) -> Result<(), PriorityError> {
        match command {
            PriorityCommand::MoveTo { material, index } => self.move_to(material, index).map(drop),
            PriorityCommand::MoveBy { material, delta } => self.move_by(material, delta).map(drop),
            PriorityCommand::SetOrder(order) => self.set_order(order),
            PriorityCommand::SetStockAccepted { material, accepted } => {
                self.set_stock_accepts(material, accepted);
                Ok(())
            }
        }
    }
}

fn shift(order: &mut [MaterialType], old: usize, new: usize) {
    if old < new {
        order[old..=new].rotate_left(1);
    } else if new < old {
        order[new..=old].rotate_right(1);
    }
}
