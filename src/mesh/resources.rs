//! Mesh cache keyed by name.
//!
//! Owned explicitly by the caller and passed by reference to the scene
//! manager and the scene compiler. Meshes are loaded once through a
//! [`MeshLoader`], built (BVH + permutation) and then shared as `Arc<Mesh>`.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use super::{Mesh, MeshData};
use crate::util::{Error, Result};

/// Source of raw mesh data.
pub trait MeshLoader: Send + Sync {
    /// Produce the mesh called `name`.
    fn load(&self, name: &str) -> Result<MeshData>;

    /// Names this loader can produce, if it can enumerate them.
    fn available(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Name → mesh cache with lazy load-once semantics.
pub struct ResourceManager {
    loader: Box<dyn MeshLoader>,
    meshes: HashMap<String, Arc<Mesh>>,
    max_leaf_size: usize,
}

impl ResourceManager {
    pub fn new(loader: Box<dyn MeshLoader>, max_leaf_size: usize) -> Self {
        Self {
            loader,
            meshes: HashMap::new(),
            max_leaf_size: max_leaf_size.max(1),
        }
    }

    pub fn max_leaf_size(&self) -> usize {
        self.max_leaf_size
    }

    pub fn loader(&self) -> &dyn MeshLoader {
        self.loader.as_ref()
    }

    /// Cached mesh, or load and build it.
    pub fn load(&mut self, name: &str) -> Result<Arc<Mesh>> {
        if let Some(mesh) = self.meshes.get(name) {
            return Ok(mesh.clone());
        }
        let mesh = Arc::new(load_and_build(self.loader.as_ref(), name, self.max_leaf_size)?);
        self.meshes.insert(name.to_string(), mesh.clone());
        Ok(mesh)
    }

    /// Load every name not yet cached, building BVHs in parallel.
    ///
    /// Returns the failures per mesh; successfully built meshes are cached.
    pub fn load_many<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<(String, Error)> {
        let mut missing: Vec<&str> = names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| !self.meshes.contains_key(*n))
            .collect();
        missing.sort_unstable();
        missing.dedup();

        let loader = self.loader.as_ref();
        let max_leaf = self.max_leaf_size;
        let built: Vec<(String, Result<Mesh>)> = missing
            .par_iter()
            .map(|&name| (name.to_string(), load_and_build(loader, name, max_leaf)))
            .collect();

        let mut failures = Vec::new();
        for (name, result) in built {
            match result {
                Ok(mesh) => {
                    self.meshes.insert(name, Arc::new(mesh));
                }
                Err(e) => failures.push((name, e)),
            }
        }
        failures
    }

    /// Build and cache an already loaded mesh, replacing any previous entry.
    pub fn insert(&mut self, data: MeshData) -> Result<Arc<Mesh>> {
        let name = data.name.clone();
        let mesh = Arc::new(Mesh::build(data, self.max_leaf_size)?);
        self.meshes.insert(name, mesh.clone());
        Ok(mesh)
    }

    /// Cached mesh without loading.
    pub fn get(&self, name: &str) -> Option<Arc<Mesh>> {
        self.meshes.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.meshes.contains_key(name)
    }

    /// Drop a cached mesh. Instances still holding the `Arc` keep it alive.
    pub fn evict(&mut self, name: &str) -> bool {
        let removed = self.meshes.remove(name).is_some();
        if removed {
            tracing::debug!(mesh = name, "evicted");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Cached mesh names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.meshes.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("meshes", &self.names())
            .field("max_leaf_size", &self.max_leaf_size)
            .finish()
    }
}

fn load_and_build(loader: &dyn MeshLoader, name: &str, max_leaf_size: usize) -> Result<Mesh> {
    // Asset-level failures are reported per mesh; anything else (I/O) passes through
    let mut data = loader.load(name).map_err(|e| match e {
        Error::MeshLoad { .. } => e,
        e if e.is_recoverable() => Error::mesh_load(name, e.to_string()),
        e => e,
    })?;
    data.name = name.to_string();
    Mesh::build(data, max_leaf_size).map_err(|e| Error::mesh_load(name, e.to_string()))
}
