use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::obj::ObjMesh;

/// Identifier that always resolves to the built-in unit cube.
pub const BUILTIN_CUBE: &str = "builtin:cube";

/// Opaque handle to a mesh owned by a [`MeshResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshId(usize);

impl MeshId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Turns mesh identifiers from the scene description into handles.
pub trait MeshResolver {
    fn resolve(&mut self, name: &str) -> Result<MeshId>;
}

/// Assigns handles by name without touching the file system.
///
/// Used by the headless runner, where only draw order and identity matter.
#[derive(Debug, Default, Clone)]
pub struct MeshCatalog {
    names: Vec<String>,
    lookup: HashMap<String, MeshId>,
}

impl MeshCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self, id: MeshId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn get(&self, name: &str) -> Option<MeshId> {
        self.lookup.get(name).copied()
    }

    fn insert(&mut self, name: &str) -> MeshId {
        let id = MeshId::new(self.names.len());
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), id);
        id
    }
}

impl MeshResolver for MeshCatalog {
    fn resolve(&mut self, name: &str) -> Result<MeshId> {
        Ok(self.get(name).unwrap_or_else(|| self.insert(name)))
    }
}

/// Loads OBJ meshes relative to an asset root, once per identifier.
#[derive(Debug)]
pub struct MeshLibrary {
    root: PathBuf,
    placeholders: bool,
    catalog: MeshCatalog,
    meshes: Vec<ObjMesh>,
}

impl MeshLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            placeholders: false,
            catalog: MeshCatalog::new(),
            meshes: Vec::new(),
        }
    }

    /// Substitute the unit cube for meshes that fail to load instead of failing.
    pub fn with_placeholders(mut self, enabled: bool) -> Self {
        self.placeholders = enabled;
        self
    }

    pub fn get(&self, id: MeshId) -> Option<&ObjMesh> {
        self.meshes.get(id.index())
    }

    pub fn name(&self, id: MeshId) -> Option<&str> {
        self.catalog.name(id)
    }

    pub fn meshes(&self) -> impl Iterator<Item = (MeshId, &ObjMesh)> {
        self.meshes
            .iter()
            .enumerate()
            .map(|(index, mesh)| (MeshId::new(index), mesh))
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    fn load(&self, name: &str) -> Result<ObjMesh> {
        if name == BUILTIN_CUBE {
            return Ok(ObjMesh::unit_cube());
        }
        let path = self.root.join(name);
        match ObjMesh::load(&path) {
            Ok(mesh) => {
                info!(
                    "loaded mesh {name} ({} triangles)",
                    mesh.triangle_count()
                );
                Ok(mesh)
            }
            Err(err) if self.placeholders => {
                warn!("using placeholder cube for {name}: {err:#}");
                Ok(ObjMesh::unit_cube())
            }
            Err(err) => Err(err),
        }
    }
}

impl MeshResolver for MeshLibrary {
    fn resolve(&mut self, name: &str) -> Result<MeshId> {
        if let Some(id) = self.catalog.get(name) {
            return Ok(id);
        }
        let mesh = self.load(name)?;
        let id = self.catalog.insert(name);
        self.meshes.push(mesh);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn catalog_reuses_handles_for_duplicate_names() {
        let mut catalog = MeshCatalog::new();
        let tv = catalog.resolve("television/scene.obj").unwrap();
        let stage = catalog.resolve("map-concert/scene.obj").unwrap();
        assert_eq!(catalog.resolve("television/scene.obj").unwrap(), tv);
        assert_ne!(tv, stage);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.name(stage), Some("map-concert/scene.obj"));
    }

    #[test]
    fn library_loads_relative_to_root() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("tri.obj")).unwrap();
        writeln!(file, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3").unwrap();

        let mut library = MeshLibrary::new(dir.path());
        let id = library.resolve("tri.obj").unwrap();
        assert_eq!(library.get(id).unwrap().triangle_count(), 1);
        assert_eq!(library.resolve("tri.obj").unwrap(), id);
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn missing_mesh_fails_without_placeholders() {
        let dir = TempDir::new().unwrap();
        let mut library = MeshLibrary::new(dir.path());
        assert!(library.resolve("missing.obj").is_err());
        assert!(library.is_empty());
    }

    #[test]
    fn missing_mesh_becomes_cube_with_placeholders() {
        let dir = TempDir::new().unwrap();
        let mut library = MeshLibrary::new(dir.path()).with_placeholders(true);
        let id = library.resolve("missing.obj").unwrap();
        assert_eq!(library.get(id).unwrap().triangle_count(), 12);
    }

    #[test]
    fn builtin_cube_needs_no_files() {
        let mut library = MeshLibrary::new("/nonexistent");
        let id = library.resolve(BUILTIN_CUBE).unwrap();
        assert_eq!(library.name(id), Some(BUILTIN_CUBE));
    }
}
