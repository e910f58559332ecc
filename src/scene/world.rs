//! Live scene state: instances and lights.
//!
//! The World is mutated by the caller (scene loading, editing) and read by
//! the scene compiler during `initialize`. It does no internal locking: scene
//! edits must not overlap a compile.

use std::collections::HashMap;

use glam::{Mat4, Vec3};

use super::descriptor::{SceneDescriptor, SceneEntry};
use super::light::{light_cdf, Light};

/// Mesh placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Resource-manager mesh name.
    pub mesh: String,
    pub transform: Mat4,
}

/// Instance with its mesh reference rewritten to a dense index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackedInstance {
    pub transform: Mat4,
    pub mesh_index: u32,
}

/// Result of [`World::pack_for_render`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedWorld {
    pub instances: Vec<PackedInstance>,
    /// Each referenced mesh exactly once, in first-use order.
    pub meshes: Vec<String>,
    pub mesh_index: HashMap<String, u32>,
}

impl PackedWorld {
    /// Drop meshes rejected by `keep` along with every instance using them,
    /// re-densifying the remaining indices. Returns the dropped instance count.
    pub fn retain_meshes(&mut self, keep: impl Fn(&str) -> bool) -> usize {
        let mut remap: Vec<Option<u32>> = Vec::with_capacity(self.meshes.len());
        let mut kept = Vec::with_capacity(self.meshes.len());
        for name in &self.meshes {
            if keep(name) {
                remap.push(Some(kept.len() as u32));
                kept.push(name.clone());
            } else {
                remap.push(None);
            }
        }

        let before = self.instances.len();
        self.instances = self
            .instances
            .iter()
            .filter_map(|inst| {
                remap[inst.mesh_index as usize].map(|mesh_index| PackedInstance {
                    transform: inst.transform,
                    mesh_index,
                })
            })
            .collect();

        self.mesh_index = kept
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i as u32))
            .collect();
        self.meshes = kept;
        before - self.instances.len()
    }
}

/// Counts from [`World::load_from_descriptor`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub instances: usize,
    pub lights: usize,
    /// Malformed entries skipped with a warning.
    pub skipped: usize,
}

/// Instances and lights of the active scene.
#[derive(Debug, Clone, Default)]
pub struct World {
    instances: Vec<Instance>,
    lights: Vec<Light>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instance(&mut self, mesh: impl Into<String>, transform: Mat4) -> usize {
        self.instances.push(Instance {
            mesh: mesh.into(),
            transform,
        });
        self.instances.len() - 1
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn add_directional_light(&mut self, direction: Vec3, color: Vec3, intensity: f32) -> usize {
        self.add_light(Light::directional(direction, color, intensity))
    }

    pub fn add_point_light(&mut self, position: Vec3, color: Vec3, intensity: f32) -> usize {
        self.add_light(Light::point(position, color, intensity))
    }

    pub fn add_area_light(&mut self, position: Vec3, u: Vec3, v: Vec3, color: Vec3, intensity: f32) -> usize {
        self.add_light(Light::rect(position, u, v, color, intensity))
    }

    /// Remove every instance of `mesh`. Returns how many were removed.
    pub fn remove_instances_of(&mut self, mesh: &str) -> usize {
        let before = self.instances.len();
        self.instances.retain(|i| i.mesh != mesh);
        before - self.instances.len()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
        self.lights.clear();
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.lights.is_empty()
    }

    /// Replace the world's contents with the descriptor's assets.
    ///
    /// Malformed entries are skipped with a warning; the rest still load.
    #[tracing::instrument(skip_all, fields(scene = %desc.id))]
    pub fn load_from_descriptor(&mut self, desc: &SceneDescriptor) -> LoadReport {
        self.clear();
        let mut report = LoadReport::default();

        for asset in &desc.assets {
            match asset.to_entry() {
                Ok(SceneEntry::Object { mesh, transform }) => {
                    self.add_instance(mesh, transform);
                    report.instances += 1;
                }
                Ok(SceneEntry::Light(light)) => {
                    self.add_light(light);
                    report.lights += 1;
                }
                Err(e) => {
                    tracing::warn!("skipping asset: {e}");
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(
            instances = report.instances,
            lights = report.lights,
            skipped = report.skipped,
            "scene '{}' loaded",
            desc.name
        );
        report
    }

    /// Instances with dense mesh indices plus the deduplicated mesh list.
    pub fn pack_for_render(&self) -> PackedWorld {
        let mut packed = PackedWorld::default();
        for inst in &self.instances {
            let next = packed.meshes.len() as u32;
            let mesh_index = *packed.mesh_index.entry(inst.mesh.clone()).or_insert_with(|| {
                packed.meshes.push(inst.mesh.clone());
                next
            });
            packed.instances.push(PackedInstance {
                transform: inst.transform,
                mesh_index,
            });
        }
        packed
    }

    /// Light-importance CDF, recomputed from the current lights.
    pub fn compute_light_cdf(&self) -> Vec<f32> {
        light_cdf(&self.lights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::descriptor::{AssetDescriptor, AssetKind, LightParams, TransformDescriptor};

    #[test]
    fn test_pack_deduplicates_meshes() {
        let mut world = World::new();
        world.add_instance("Cube", Mat4::IDENTITY);
        world.add_instance("Chair", Mat4::from_translation(Vec3::X));
        world.add_instance("Cube", Mat4::from_translation(Vec3::Y));

        let packed = world.pack_for_render();
        assert_eq!(packed.meshes, vec!["Cube".to_string(), "Chair".to_string()]);
        let indices: Vec<u32> = packed.instances.iter().map(|i| i.mesh_index).collect();
        assert_eq!(indices, vec![0, 1, 0]);
        assert_eq!(packed.mesh_index["Chair"], 1);
    }

    #[test]
    fn test_pack_is_idempotent() {
        let mut world = World::new();
        world.add_instance("A", Mat4::IDENTITY);
        world.add_instance("B", Mat4::IDENTITY);
        assert_eq!(world.pack_for_render(), world.pack_for_render());
    }

    #[test]
    fn test_retain_meshes_redensifies() {
        let mut world = World::new();
        world.add_instance("A", Mat4::IDENTITY);
        world.add_instance("Missing", Mat4::IDENTITY);
        world.add_instance("B", Mat4::IDENTITY);
        world.add_instance("Missing", Mat4::IDENTITY);

        let mut packed = world.pack_for_render();
        let dropped = packed.retain_meshes(|name| name != "Missing");
        assert_eq!(dropped, 2);
        assert_eq!(packed.meshes, vec!["A".to_string(), "B".to_string()]);
        let indices: Vec<u32> = packed.instances.iter().map(|i| i.mesh_index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(packed.mesh_index.len(), 2);
    }

    #[test]
    fn test_load_clears_and_skips_malformed() {
        let mut world = World::new();
        world.add_instance("Old", Mat4::IDENTITY);

        let desc = SceneDescriptor {
            id: "t".into(),
            name: "t".into(),
            description: String::new(),
            assets: vec![
                AssetDescriptor::object("c", "Cube", TransformDescriptor::default()),
                AssetDescriptor::light(
                    "l",
                    AssetKind::PointLight,
                    LightParams { position: Some([0.0; 3]), intensity: Some(1.0), ..Default::default() },
                ),
                AssetDescriptor::light("bad", AssetKind::RectLight, LightParams::default()),
            ],
        };
        let report = world.load_from_descriptor(&desc);
        assert_eq!(report, LoadReport { instances: 1, lights: 1, skipped: 1 });
        assert_eq!(world.instances().len(), 1);
        assert_eq!(world.instances()[0].mesh, "Cube");
    }

    #[test]
    fn test_remove_instances_of() {
        let mut world = World::new();
        world.add_instance("A", Mat4::IDENTITY);
        world.add_instance("B", Mat4::IDENTITY);
        world.add_instance("A", Mat4::IDENTITY);
        assert_eq!(world.remove_instances_of("A"), 2);
        assert_eq!(world.instances().len(), 1);
    }
}
