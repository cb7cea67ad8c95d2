//! Serde data file structs for logistics configuration.
//!
//! These structs define the on-disk format. They are deserialized from RON,
//! JSON, or TOML data files and then resolved into core types by the loader.

use serde::Deserialize;
use stockyard_core::request::DEFAULT_IN_DELIVERABLE_CAP;

/// Top level of a logistics file.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticsData {
    pub materials: Vec<MaterialData>,
    #[serde(default)]
    pub buildings: Vec<String>,
    #[serde(default)]
    pub defaults: DefaultsData,
    /// Distribution order by material name. Droppable materials left out
    /// follow in registration order.
    #[serde(default)]
    pub priority_order: Vec<String>,
    /// Materials that stock buildings refuse by default.
    #[serde(default)]
    pub stock_rejected: Vec<String>,
}

/// A material type definition.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialData {
    pub name: String,
    #[serde(default = "default_true")]
    pub droppable: bool,
}

/// Defaults applied to new requests.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsData {
    #[serde(default = "default_cap")]
    pub in_deliverable_cap: u32,
    #[serde(default)]
    pub round_robin: bool,
}

impl Default for DefaultsData {
    fn default() -> Self {
        Self {
            in_deliverable_cap: default_cap(),
            round_robin: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cap() -> u32 {
    DEFAULT_IN_DELIVERABLE_CAP
}
