//! Loading pipeline: reads a logistics file, resolves names, builds the
//! material registry, request defaults and distribution order.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers.

use crate::schema::LogisticsData;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use stockyard_core::id::MaterialType;
use stockyard_core::ordering::MaterialPriorities;
use stockyard_core::registry::{MaterialRegistry, RegistryBuilder, RegistryError};
use stockyard_core::request::RequestDefaults;

/// Base name of the logistics file inside a data directory.
pub const LOGISTICS_FILE: &str = "logistics";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: &'static str, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A value is out of its allowed range.
    #[error("invalid value in {file}: {detail}")]
    InvalidValue { file: PathBuf, detail: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_error = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
    }
}

// ===========================================================================
// Resolution
// ===========================================================================

/// Everything a logistics file configures.
#[derive(Debug, Clone)]
pub struct LogisticsConfig {
    pub registry: MaterialRegistry,
    pub defaults: RequestDefaults,
    /// Starting settings for every new partition.
    pub priorities: MaterialPriorities,
}

/// Load `logistics.{ron,toml,json}` from a data directory.
pub fn load_logistics_dir(dir: &Path) -> Result<LogisticsConfig, DataLoadError> {
    let path = find_data_file(dir, LOGISTICS_FILE)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: LOGISTICS_FILE,
        dir: dir.to_path_buf(),
    })?;
    load_logistics_config(&path)
}

/// Load and resolve one logistics file.
pub fn load_logistics_config(path: &Path) -> Result<LogisticsConfig, DataLoadError> {
    let data: LogisticsData = deserialize_file(path)?;
    let config = resolve(data, path)?;
    tracing::info!(
        file = %path.display(),
        materials = config.registry.material_count(),
        buildings = config.registry.building_count(),
        "loaded logistics config"
    );
    Ok(config)
}

fn resolve(data: LogisticsData, file: &Path) -> Result<LogisticsConfig, DataLoadError> {
    let duplicate = |name: &str| DataLoadError::DuplicateName {
        file: file.to_path_buf(),
        name: name.to_string(),
    };

    let mut builder = RegistryBuilder::new();
    for material in &data.materials {
        if builder.material_id(&material.name).is_some() {
            return Err(duplicate(&material.name));
        }
        builder.register_material(&material.name, material.droppable)?;
    }
    let mut buildings = HashSet::new();
    for building in &data.buildings {
        if !buildings.insert(building.as_str()) {
            return Err(duplicate(building));
        }
        builder.register_building(building)?;
    }
    let registry = builder.build()?;

    if data.defaults.in_deliverable_cap == 0 {
        return Err(DataLoadError::InvalidValue {
            file: file.to_path_buf(),
            detail: "in_deliverable_cap must be at least 1".to_string(),
        });
    }
    let defaults = RequestDefaults {
        in_deliverable_cap: data.defaults.in_deliverable_cap,
        round_robin: data.defaults.round_robin,
    };

    let resolve_droppable = |name: &str| -> Result<MaterialType, DataLoadError> {
        registry
            .material_id(name)
            .filter(|&id| registry.is_droppable(id))
            .ok_or_else(|| DataLoadError::UnresolvedRef {
                file: file.to_path_buf(),
                name: name.to_string(),
                expected_kind: "droppable material",
            })
    };

    let mut order = Vec::with_capacity(data.priority_order.len());
    for name in &data.priority_order {
        let id = resolve_droppable(name)?;
        if order.contains(&id) {
            return Err(duplicate(name));
        }
        order.push(id);
    }
    for id in registry.droppable_materials() {
        if !order.contains(&id) {
            order.push(id);
        }
    }
    let mut priorities = MaterialPriorities::new(order);
    for name in &data.stock_rejected {
        priorities.set_stock_accepts(resolve_droppable(name)?, false);
    }

    Ok(LogisticsConfig {
        registry,
        defaults,
        priorities,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
