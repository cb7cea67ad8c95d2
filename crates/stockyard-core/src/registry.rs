use crate::id::{BuildingTypeId, MaterialType};
use std::collections::HashMap;

/// A material type definition in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialDef {
    pub name: String,
    /// Whether carriers may drop and pick up this material. Only droppable
    /// materials take part in distribution order.
    pub droppable: bool,
}

/// A building type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingTemplateDef {
    pub name: String,
}

/// Builder for constructing an immutable [`MaterialRegistry`].
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    materials: Vec<MaterialDef>,
    material_name_to_id: HashMap<String, MaterialType>,
    buildings: Vec<BuildingTemplateDef>,
    building_name_to_id: HashMap<String, BuildingTypeId>,
    duplicates: Vec<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: Register a material type. Returns its ID.
    ///
    /// A repeated name keeps its first ID and fails the final build. Fails
    /// once the ID space is used up.
    pub fn register_material(&mut self, name: &str, droppable: bool) -> Result<MaterialType, RegistryError> {
        if let Some(&id) = self.material_name_to_id.get(name) {
            self.duplicates.push(name.to_string());
            return Ok(id);
        }
        let index = u16::try_from(self.materials.len())
            .map_err(|_| RegistryError::TooMany(self.materials.len() + 1))?;
        let id = MaterialType(index);
        self.materials.push(MaterialDef {
            name: name.to_string(),
            droppable,
        });
        self.material_name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Phase 1: Register a building type. Returns its ID.
    pub fn register_building(&mut self, name: &str) -> Result<BuildingTypeId, RegistryError> {
        if let Some(&id) = self.building_name_to_id.get(name) {
            self.duplicates.push(name.to_string());
            return Ok(id);
        }
        let index = u16::try_from(self.buildings.len())
            .map_err(|_| RegistryError::TooManyBuildings(self.buildings.len() + 1))?;
        let id = BuildingTypeId(index);
        self.buildings.push(BuildingTemplateDef {
            name: name.to_string(),
        });
        self.building_name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Phase 2: Mutate an existing material by name.
    pub fn mutate_material<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut MaterialDef),
    {
        let id = self
            .material_name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        f(&mut self.materials[id.0 as usize]);
        Ok(())
    }

    pub fn material_id(&self, name: &str) -> Option<MaterialType> {
        self.material_name_to_id.get(name).copied()
    }

    /// Phase 3: Finalize and build the immutable registry.
    pub fn build(self) -> Result<MaterialRegistry, RegistryError> {
        if let Some(name) = self.duplicates.into_iter().next() {
            return Err(RegistryError::DuplicateName(name));
        }

        Ok(MaterialRegistry {
            materials: self.materials,
            material_name_to_id: self.material_name_to_id,
            buildings: self.buildings,
            building_name_to_id: self.building_name_to_id,
        })
    }
}

/// Immutable registry. Frozen after build(). Thread-safe to share.
#[derive(Debug, Clone)]
pub struct MaterialRegistry {
    materials: Vec<MaterialDef>,
    material_name_to_id: HashMap<String, MaterialType>,
    buildings: Vec<BuildingTemplateDef>,
    building_name_to_id: HashMap<String, BuildingTypeId>,
}

impl MaterialRegistry {
    pub fn get_material(&self, id: MaterialType) -> Option<&MaterialDef> {
        self.materials.get(id.0 as usize)
    }

    pub fn get_building(&self, id: BuildingTypeId) -> Option<&BuildingTemplateDef> {
        self.buildings.get(id.0 as usize)
    }

    pub fn material_id(&self, name: &str) -> Option<MaterialType> {
        self.material_name_to_id.get(name).copied()
    }

    pub fn building_id(&self, name: &str) -> Option<BuildingTypeId> {
        self.building_name_to_id.get(name).copied()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_droppable(&self, id: MaterialType) -> bool {
        self.get_material(id).is_some_and(|m| m.droppable)
    }

    /// Droppable materials in registration order.
    pub fn droppable_materials(&self) -> Vec<MaterialType> {
        self.materials
            .iter()
            .enumerate()
            .filter(|(_, m)| m.droppable)
            .map(|(i, _)| MaterialType(i as u16))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("too many material types: {0}")]
    TooMany(usize),
    #[error("too many building types: {0}")]
    TooManyBuildings(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_builder() -> RegistryBuilder {
        let mut b = RegistryBuilder::new();
        b.register_material("plank", true).unwrap();
        b.register_material("stone", true).unwrap();
        b.register_material("no_material", false).unwrap();
        b.register_material("fish", true).unwrap();
        b.register_building("harbor").unwrap();
        b
    }

    #[test]
    fn register_and_build() {
        let reg = setup_builder().build().unwrap();
        assert_eq!(reg.material_count(), 4);
        assert_eq!(reg.building_count(), 1);
    }

    #[test]
    fn lookup_by_name() {
        let reg = setup_builder().build().unwrap();
        assert_eq!(reg.material_id("stone"), Some(MaterialType(1)));
        assert!(reg.material_id("nonexistent").is_none());
        assert_eq!(reg.building_id("harbor"), Some(BuildingTypeId(0)));
    }

    #[test]
    fn droppable_materials_skip_the_rest() {
        let reg = setup_builder().build().unwrap();
        assert_eq!(
            reg.droppable_materials(),
            vec![MaterialType(0), MaterialType(1), MaterialType(3)]
        );
        assert!(!reg.is_droppable(MaterialType(2)));
        assert!(!reg.is_droppable(MaterialType(99)));
    }

    #[test]
    fn mutate_material() {
        let mut builder = setup_builder();
        builder.mutate_material("no_material", |m| m.droppable = true).unwrap();
        let reg = builder.build().unwrap();
        assert!(reg.is_droppable(MaterialType(2)));
    }

    #[test]
    fn mutate_nonexistent_fails() {
        let mut builder = setup_builder();
        match builder.mutate_material("nonexistent", |_| {}) {
            Err(RegistryError::NotFound(name)) => assert_eq!(name, "nonexistent"),
            other => panic!("expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_fail_the_build() {
        let mut builder = setup_builder();
        let again = builder.register_material("stone", false).unwrap();
        assert_eq!(again, MaterialType(1));
        assert_eq!(
            builder.build().unwrap_err(),
            RegistryError::DuplicateName("stone".to_string())
        );
    }

    #[test]
    fn material_ids_never_wrap() {
        let mut builder = RegistryBuilder::new();
        for i in 0..=u32::from(u16::MAX) {
            builder.register_material(&format!("m{i}"), true).unwrap();
        }
        assert_eq!(builder.material_id("m65535"), Some(MaterialType(u16::MAX)));
        assert_eq!(
            builder.register_material("one_too_many", true),
            Err(RegistryError::TooMany(65537))
        );
        assert_eq!(builder.material_id("one_too_many"), None);
        assert_eq!(builder.build().unwrap().material_count(), 65536);
    }

    #[test]
    fn registry_get_nonexistent_returns_none() {
        let reg = setup_builder().build().unwrap();
        assert!(reg.get_material(MaterialType(999)).is_none());
        assert!(reg.get_building(BuildingTypeId(999)).is_none());
    }

    #[test]
    fn empty_registry_builds_successfully() {
        let reg = RegistryBuilder::new().build().unwrap();
        assert_eq!(reg.material_count(), 0);
        assert!(reg.droppable_materials().is_empty());
    }
}
