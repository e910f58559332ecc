//! Scene registry and scene switching.

use super::builtin::{builtin_scenes, DEFAULT_SCENE};
use super::descriptor::SceneDescriptor;
use super::world::World;
use crate::mesh::ResourceManager;
use crate::util::{Error, Result};

/// Outcome of populating the World from a scene.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneLoadReport {
    pub scene_id: String,
    pub instances: usize,
    pub lights: usize,
    /// Malformed descriptor entries skipped.
    pub skipped: usize,
    /// Meshes that failed to load; their instances were dropped.
    pub failed_meshes: Vec<String>,
}

/// Registered scenes and the currently loaded one.
#[derive(Debug, Clone)]
pub struct SceneManager {
    scenes: Vec<SceneDescriptor>,
    default_id: String,
    current: Option<String>,
}

impl SceneManager {
    pub fn new(scenes: Vec<SceneDescriptor>, default_id: impl Into<String>) -> Self {
        Self {
            scenes,
            default_id: default_id.into(),
            current: None,
        }
    }

    pub fn with_builtin_scenes() -> Self {
        Self::new(builtin_scenes(), DEFAULT_SCENE)
    }

    /// Add or replace a scene with the same id.
    pub fn register(&mut self, desc: SceneDescriptor) {
        match self.scenes.iter_mut().find(|s| s.id == desc.id) {
            Some(slot) => *slot = desc,
            None => self.scenes.push(desc),
        }
    }

    pub fn set_default(&mut self, id: impl Into<String>) {
        self.default_id = id.into();
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    pub fn scenes(&self) -> &[SceneDescriptor] {
        &self.scenes
    }

    pub fn get(&self, id: &str) -> Option<&SceneDescriptor> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Load `id`, or the default scene when `id` is absent or unknown.
    pub fn load_scene(
        &mut self,
        id: Option<&str>,
        world: &mut World,
        resources: &mut ResourceManager,
    ) -> Result<SceneLoadReport> {
        let desc = match id.and_then(|id| self.get(id)) {
            Some(desc) => desc.clone(),
            None => {
                if let Some(id) = id {
                    tracing::warn!("scene '{id}' not found, loading default '{}'", self.default_id);
                }
                self.get(&self.default_id)
                    .cloned()
                    .ok_or_else(|| Error::UnknownScene(self.default_id.clone()))?
            }
        };
        self.populate(&desc, world, resources)
    }

    /// Switch to `id`. Unknown ids leave the World and the current scene untouched.
    pub fn switch_scene(
        &mut self,
        id: &str,
        world: &mut World,
        resources: &mut ResourceManager,
    ) -> Result<SceneLoadReport> {
        let Some(desc) = self.get(id).cloned() else {
            tracing::warn!("scene switch aborted: '{id}' not found");
            return Err(Error::UnknownScene(id.to_string()));
        };
        self.populate(&desc, world, resources)
    }

    /// Load referenced meshes, then rebuild the World from `desc`.
    ///
    /// Per-mesh asset failures drop that mesh's instances. Any other failure
    /// aborts before the World is touched.
    fn populate(
        &mut self,
        desc: &SceneDescriptor,
        world: &mut World,
        resources: &mut ResourceManager,
    ) -> Result<SceneLoadReport> {
        let mut failures = resources.load_many(&desc.mesh_names());
        if let Some(pos) = failures.iter().position(|(_, e)| !e.is_recoverable()) {
            let (name, err) = failures.swap_remove(pos);
            tracing::error!("scene '{}' aborted, mesh '{name}' failed: {err}", desc.id);
            return Err(err);
        }
        for (name, err) in &failures {
            tracing::warn!("mesh '{name}' unavailable, dropping its instances: {err}");
        }

        let loaded = world.load_from_descriptor(desc);
        let mut dropped = 0;
        for (name, _) in &failures {
            dropped += world.remove_instances_of(name);
        }

        self.current = Some(desc.id.clone());
        Ok(SceneLoadReport {
            scene_id: desc.id.clone(),
            instances: loaded.instances - dropped,
            lights: loaded.lights,
            skipped: loaded.skipped,
            failed_meshes: failures.into_iter().map(|(name, _)| name).collect(),
        })
    }
}

impl Default for SceneManager {
    fn default() -> Self {
        Self::with_builtin_scenes()
    }
}
