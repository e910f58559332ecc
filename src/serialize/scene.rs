//! Scene compiler: World + meshes into the three GPU buffers.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use rayon::prelude::*;

use super::mesh::{serialize_mesh, GpuMaterial, GpuMeshDescriptor, MeshSections, TextureData};
use crate::bvh::BvhNode;
use crate::mesh::ResourceManager;
use crate::pack::{merge, BufferLayout, LayoutBuilder, Section};
use crate::scene::{GpuLight, World};

/// Instance record (36 words).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuInstance {
    pub model: [[f32; 4]; 4],
    pub inverse: [[f32; 4]; 4],
    pub mesh_index: u32,
    pub _pad: [u32; 3],
}

impl GpuInstance {
    /// `None` when `model` is singular and has no usable inverse.
    pub fn new(model: Mat4, mesh_index: u32) -> Option<Self> {
        let det = model.determinant();
        if !det.is_finite() || det.abs() <= f32::EPSILON {
            return None;
        }
        Some(Self {
            model: model.to_cols_array_2d(),
            inverse: model.inverse().to_cols_array_2d(),
            mesh_index,
            _pad: [0; 3],
        })
    }
}

/// Concatenate one section type across all meshes.
fn merge_sections<T, F>(sections: &[MeshSections], field: F) -> (Vec<T>, Vec<usize>)
where
    T: Clone,
    F: Fn(&MeshSections) -> &[T],
{
    let parts: Vec<&[T]> = sections.iter().map(field).collect();
    merge(&parts)
}

/// Word offset of every section plus the counts the shaders loop over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneOffsets {
    pub instances: u32,
    pub mesh_descriptors: u32,
    pub materials: u32,
    pub lights: u32,
    pub light_cdf: u32,
    pub vertices: u32,
    pub indices: u32,
    pub submesh_roots: u32,
    pub primitive_materials: u32,
    pub tlas: u32,
    pub blas: u32,
    pub instance_count: u32,
    pub light_count: u32,
}

/// Output of [`compile_scene`].
#[derive(Debug, Clone, Default)]
pub struct CompiledScene {
    /// Instances, mesh descriptors, materials, lights, light CDF.
    pub scene: Vec<u32>,
    /// Vertices, indices, submesh roots, primitive materials.
    pub geometry: Vec<u32>,
    /// TLAS (reserved, empty) and all BLAS nodes.
    pub accel: Vec<u32>,
    pub scene_layout: BufferLayout,
    pub geometry_layout: BufferLayout,
    pub accel_layout: BufferLayout,
    pub instance_count: u32,
    pub light_count: u32,
    pub mesh_count: u32,
    pub textures: Vec<TextureData>,
    /// Instances dropped for a missing mesh or a singular transform.
    pub dropped_instances: usize,
}

impl CompiledScene {
    pub fn offsets(&self) -> SceneOffsets {
        let s = |sec| self.scene_layout.offset(sec);
        let g = |sec| self.geometry_layout.offset(sec);
        let a = |sec| self.accel_layout.offset(sec);
        SceneOffsets {
            instances: s(Section::Instances),
            mesh_descriptors: s(Section::MeshDescriptors),
            materials: s(Section::Materials),
            lights: s(Section::Lights),
            light_cdf: s(Section::LightCdf),
            vertices: g(Section::Vertices),
            indices: g(Section::Indices),
            submesh_roots: g(Section::SubmeshRoots),
            primitive_materials: g(Section::PrimitiveMaterials),
            tlas: a(Section::Tlas),
            blas: a(Section::Blas),
            instance_count: self.instance_count,
            light_count: self.light_count,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.scene_layout.total_bytes() + self.geometry_layout.total_bytes() + self.accel_layout.total_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.instance_count == 0 && self.light_count == 0
    }
}

/// Compile the World into packed buffers.
///
/// Instances whose mesh is not resident in `resources`, or whose transform
/// is singular, are dropped with a warning; everything else still compiles.
#[tracing::instrument(skip_all, fields(instances = world.instances().len(), lights = world.lights().len()))]
pub fn compile_scene(world: &World, resources: &ResourceManager) -> CompiledScene {
    let mut packed = world.pack_for_render();
    let dropped_instances = packed.retain_meshes(|name| {
        let found = resources.contains(name);
        if !found {
            tracing::warn!("mesh '{name}' not loaded, dropping its instances");
        }
        found
    });

    let meshes: Vec<_> = packed.meshes.iter().filter_map(|name| resources.get(name)).collect();
    let sections: Vec<MeshSections> = meshes.par_iter().map(|mesh| serialize_mesh(mesh)).collect();

    // Second packing level: every per-mesh section concatenated across meshes
    let (textures, texture_offsets) = merge_sections(&sections, |s| s.textures.as_slice());
    let rebased: Vec<Vec<GpuMaterial>> = sections
        .iter()
        .zip(&texture_offsets)
        .map(|(s, &base)| s.materials.iter().map(|m| m.rebase_textures(base)).collect())
        .collect();
    let (materials, material_offsets) = merge(&rebased);
    let (vertices, vertex_offsets) = merge_sections(&sections, |s| s.vertices.as_slice());
    let (indices, index_offsets) = merge_sections(&sections, |s| s.indices.as_slice());
    let (roots, root_offsets) = merge_sections(&sections, |s| s.submesh_roots.as_slice());
    let (blas, blas_offsets) = merge_sections(&sections, |s| s.blas.as_slice());
    let (primitive_materials, primitive_material_offsets) =
        merge_sections(&sections, |s| s.primitive_materials.as_slice());

    let descriptors: Vec<GpuMeshDescriptor> = sections
        .iter()
        .enumerate()
        .map(|(i, s)| GpuMeshDescriptor {
            vertex_offset: vertex_offsets[i] as u32,
            index_offset: index_offsets[i] as u32,
            material_offset: material_offsets[i] as u32,
            submesh_root_offset: root_offsets[i] as u32,
            blas_offset: blas_offsets[i] as u32,
            submesh_count: s.submesh_roots.len() as u32,
            primitive_material_offset: primitive_material_offsets[i] as u32,
            primitive_count: s.primitive_materials.len() as u32,
        })
        .collect();

    let instances: Vec<GpuInstance> = packed
        .instances
        .iter()
        .filter_map(|inst| {
            let record = GpuInstance::new(inst.transform, inst.mesh_index);
            if record.is_none() {
                tracing::warn!("instance of mesh {} has a singular transform, dropping it", inst.mesh_index);
            }
            record
        })
        .collect();
    let dropped_instances = dropped_instances + (packed.instances.len() - instances.len());
    let lights: Vec<GpuLight> = world.lights().iter().map(|l| l.to_gpu()).collect();
    let cdf = world.compute_light_cdf();

    let (scene, scene_layout) = LayoutBuilder::new()
        .section(Section::Instances, &instances)
        .section(Section::MeshDescriptors, &descriptors)
        .section(Section::Materials, &materials)
        .section(Section::Lights, &lights)
        .section(Section::LightCdf, &cdf)
        .finish();
    let (geometry, geometry_layout) = LayoutBuilder::new()
        .section(Section::Vertices, &vertices)
        .section(Section::Indices, &indices)
        .section(Section::SubmeshRoots, &roots)
        .section(Section::PrimitiveMaterials, &primitive_materials)
        .finish();
    let (accel, accel_layout) = LayoutBuilder::new()
        .section::<BvhNode>(Section::Tlas, &[])
        .section(Section::Blas, &blas)
        .finish();

    tracing::debug!(
        meshes = descriptors.len(),
        scene_words = scene.len(),
        geometry_words = geometry.len(),
        accel_words = accel.len(),
        "scene compiled"
    );

    CompiledScene {
        scene,
        geometry,
        accel,
        scene_layout,
        geometry_layout,
        accel_layout,
        instance_count: instances.len() as u32,
        light_count: lights.len() as u32,
        mesh_count: descriptors.len() as u32,
        textures,
        dropped_instances,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::ProceduralLoader;
    use glam::Vec3;

    fn resources() -> ResourceManager {
        ResourceManager::new(Box::new(ProceduralLoader), 4)
    }

    #[test]
    fn test_instance_record_size() {
        assert_eq!(std::mem::size_of::<GpuInstance>(), 36 * 4);
    }

    #[test]
    fn test_single_cube_with_sun() {
        let mut rm = resources();
        rm.load("Cube").unwrap();
        let mut world = World::new();
        world.add_instance("Cube", Mat4::IDENTITY);
        world.add_directional_light(Vec3::NEG_Z, Vec3::ONE, 5.0);

        let c = compile_scene(&world, &rm);
        assert_eq!(c.instance_count, 1);
        assert_eq!(c.mesh_count, 1);
        assert_eq!(c.light_count, 1);

        let o = c.offsets();
        assert_eq!(o.instances, 0);
        assert_eq!(o.mesh_descriptors, 36);
        let cdf = c.scene_layout.get(Section::LightCdf).unwrap();
        assert_eq!(cdf.len, 1);
        assert_eq!(f32::from_bits(c.scene[cdf.offset]), 1.0);
        assert_eq!(c.geometry_layout.get(Section::Vertices).unwrap().len, 24 * 8);
    }

    #[test]
    fn test_shared_mesh_serialized_once() {
        let mut rm = resources();
        rm.load("Cube").unwrap();
        rm.load("Quad").unwrap();
        let mut world = World::new();
        world.add_instance("Cube", Mat4::IDENTITY);
        world.add_instance("Quad", Mat4::IDENTITY);
        world.add_instance("Cube", Mat4::from_translation(Vec3::X));

        let c = compile_scene(&world, &rm);
        assert_eq!(c.instance_count, 3);
        assert_eq!(c.mesh_count, 2);

        let descs: &[GpuMeshDescriptor] = {
            let r = c.scene_layout.get(Section::MeshDescriptors).unwrap();
            bytemuck::cast_slice(&c.scene[r.offset..r.end()])
        };
        let cube = rm.get("Cube").unwrap();
        assert_eq!(descs[0].vertex_offset, 0);
        assert_eq!(descs[1].vertex_offset, cube.vertices().len() as u32);
        assert_eq!(descs[1].index_offset, cube.indices().len() as u32);
        assert_eq!(descs[1].blas_offset, cube.node_count() as u32);

        let insts: &[GpuInstance] = {
            let r = c.scene_layout.get(Section::Instances).unwrap();
            bytemuck::cast_slice(&c.scene[r.offset..r.end()])
        };
        let idx: Vec<u32> = insts.iter().map(|i| i.mesh_index).collect();
        assert_eq!(idx, vec![0, 1, 0]);
    }

    #[test]
    fn test_missing_mesh_is_dropped() {
        let mut rm = resources();
        rm.load("Cube").unwrap();
        let mut world = World::new();
        world.add_instance("Ghost", Mat4::IDENTITY);
        world.add_instance("Cube", Mat4::IDENTITY);

        let c = compile_scene(&world, &rm);
        assert_eq!(c.dropped_instances, 1);
        assert_eq!(c.instance_count, 1);
        assert_eq!(c.mesh_count, 1);
    }

    #[test]
    fn test_descriptor_offsets_follow_mesh_order() {
        let mut rm = resources();
        for name in ["Quad", "Cube", "Plane"] {
            rm.load(name).unwrap();
        }
        let mut world = World::new();
        for name in ["Quad", "Cube", "Plane"] {
            world.add_instance(name, Mat4::IDENTITY);
        }

        let c = compile_scene(&world, &rm);
        let descs: &[GpuMeshDescriptor] = {
            let r = c.scene_layout.get(Section::MeshDescriptors).unwrap();
            bytemuck::cast_slice(&c.scene[r.offset..r.end()])
        };
        assert_eq!(descs.len(), 3);

        let mut expected = GpuMeshDescriptor::zeroed();
        for (d, name) in descs.iter().zip(["Quad", "Cube", "Plane"]) {
            let mesh = rm.get(name).unwrap();
            assert_eq!(d.vertex_offset, expected.vertex_offset, "{name}");
            assert_eq!(d.index_offset, expected.index_offset, "{name}");
            assert_eq!(d.material_offset, expected.material_offset, "{name}");
            assert_eq!(d.submesh_root_offset, expected.submesh_root_offset, "{name}");
            assert_eq!(d.blas_offset, expected.blas_offset, "{name}");
            assert_eq!(d.primitive_material_offset, expected.primitive_material_offset, "{name}");
            assert_eq!(d.submesh_count, mesh.submeshes().len() as u32);
            assert_eq!(d.primitive_count, mesh.triangle_count() as u32);

            expected.vertex_offset += mesh.vertices().len() as u32;
            expected.index_offset += mesh.indices().len() as u32;
            expected.material_offset += mesh.materials().len() as u32;
            expected.submesh_root_offset += mesh.submeshes().len() as u32;
            expected.blas_offset += mesh.node_count() as u32;
            expected.primitive_material_offset += mesh.triangle_count() as u32;
        }
        assert_eq!(
            c.geometry_layout.get(Section::Indices).unwrap().len,
            expected.index_offset as usize
        );
    }

    #[test]
    fn test_singular_transform_is_dropped() {
        let mut rm = resources();
        rm.load("Cube").unwrap();
        let mut world = World::new();
        world.add_instance("Cube", Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)));
        world.add_instance("Cube", Mat4::from_translation(Vec3::Y));

        let c = compile_scene(&world, &rm);
        assert_eq!(c.instance_count, 1);
        assert_eq!(c.dropped_instances, 1);

        let r = c.scene_layout.get(Section::Instances).unwrap();
        let insts: &[GpuInstance] = bytemuck::cast_slice(&c.scene[r.offset..r.end()]);
        assert!(insts[0].inverse.iter().flatten().all(|v| v.is_finite()));
        assert!(GpuInstance::new(Mat4::ZERO, 0).is_none());
    }

    #[test]
    fn test_empty_world() {
        let c = compile_scene(&World::new(), &resources());
        assert!(c.is_empty());
        assert!(c.scene.is_empty());
        let o = c.offsets();
        assert_eq!(o.tlas, 0);
        assert_eq!(o.blas, 0);
    }

    #[test]
    fn test_tlas_reserved_before_blas() {
        let mut rm = resources();
        rm.load("Plane").unwrap();
        let mut world = World::new();
        world.add_instance("Plane", Mat4::IDENTITY);
        let c = compile_scene(&world, &rm);
        let tlas = c.accel_layout.get(Section::Tlas).unwrap();
        assert_eq!(tlas.len, 0);
        assert_eq!(c.offsets().blas, 0);
        assert_eq!(c.accel.len(), rm.get("Plane").unwrap().node_count() * 8);
    }
}
