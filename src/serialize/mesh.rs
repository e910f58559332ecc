//! Per-mesh serialization.

use bytemuck::{Pod, Zeroable};

use crate::bvh::BvhNode;
use crate::mesh::{Material, Mesh, Vertex};
use crate::pack::merge;

/// Material record (20 words).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuMaterial {
    pub base_color: [f32; 4],
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub metalness: f32,
    pub roughness: f32,
    pub blend_mode: u32,
    pub alpha_cutoff: f32,
    pub normal_scale: [f32; 2],
    pub ior: f32,
    pub _pad: u32,
    /// base color, occlusion-roughness-metalness, emissive, normal; -1 if absent.
    pub textures: [i32; 4],
}

impl GpuMaterial {
    /// Convert with texture slots resolved against `texture_count` packed textures.
    pub fn from_material(m: &Material, texture_base: usize, texture_count: usize) -> Self {
        let slot = |s: Option<u32>| match s {
            Some(i) if (i as usize) < texture_count => (texture_base + i as usize) as i32,
            _ => -1,
        };
        Self {
            base_color: m.base_color,
            emissive: m.emissive,
            emissive_intensity: m.emissive_intensity,
            metalness: m.metalness,
            roughness: m.roughness.clamp(0.02, 1.0),
            blend_mode: m.blend_mode as u32,
            alpha_cutoff: m.alpha_cutoff.unwrap_or(0.5),
            normal_scale: m.normal_scale,
            ior: m.ior,
            _pad: 0,
            textures: [
                slot(m.textures.base_color),
                slot(m.textures.orm),
                slot(m.textures.emissive),
                slot(m.textures.normal),
            ],
        }
    }

    /// Shift resolved texture slots by `base`; absent slots stay -1.
    pub fn rebase_textures(mut self, base: usize) -> Self {
        for slot in &mut self.textures {
            if *slot >= 0 {
                *slot += base as i32;
            }
        }
        self
    }
}

/// Per-submesh BVH root record (4 words).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SubmeshRoot {
    /// Root node index within the mesh's BLAS.
    pub root: u32,
    pub first_primitive: u32,
    pub primitive_count: u32,
    /// Material index within the mesh's materials.
    pub material: u32,
}

/// Mesh descriptor (8 words); every offset is relative to its section start.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuMeshDescriptor {
    /// First vertex.
    pub vertex_offset: u32,
    /// First index (word).
    pub index_offset: u32,
    /// First material record.
    pub material_offset: u32,
    /// First submesh root record.
    pub submesh_root_offset: u32,
    /// First BVH node.
    pub blas_offset: u32,
    pub submesh_count: u32,
    /// First primitive material entry.
    pub primitive_material_offset: u32,
    pub primitive_count: u32,
}

/// Decoded texture ready for packing.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub rgba8: Vec<u8>,
}

/// GPU-ready sections of one mesh.
#[derive(Debug, Clone, Default)]
pub struct MeshSections {
    pub vertices: Vec<Vertex>,
    /// Triangle indices in BVH leaf order, relative to this mesh's vertices.
    pub indices: Vec<u32>,
    pub materials: Vec<GpuMaterial>,
    pub submesh_roots: Vec<SubmeshRoot>,
    /// All submesh BVHs back to back.
    pub blas: Vec<BvhNode>,
    /// Material per primitive in BVH leaf order.
    pub primitive_materials: Vec<u32>,
    pub textures: Vec<TextureData>,
}

/// Serialize one mesh. Submesh BVHs are merged into one node array and
/// their start indices become the submesh root table.
#[tracing::instrument(skip_all, fields(mesh = mesh.name()))]
pub fn serialize_mesh(mesh: &Mesh) -> MeshSections {
    let textures = extract_textures(mesh);
    let (blas, roots) = merge(mesh.submesh_bvhs());

    let submesh_roots = mesh
        .submeshes()
        .iter()
        .zip(roots)
        .map(|(sm, root)| SubmeshRoot {
            root: root as u32,
            first_primitive: sm.first_primitive,
            primitive_count: sm.primitive_count,
            material: sm.material,
        })
        .collect();

    let materials = mesh
        .materials()
        .iter()
        .map(|m| GpuMaterial::from_material(m, 0, textures.len()))
        .collect();

    MeshSections {
        vertices: mesh.vertices().to_vec(),
        indices: mesh.indices().to_vec(),
        materials,
        submesh_roots,
        blas,
        primitive_materials: mesh.primitive_materials(),
        textures,
    }
}

/// Texture extraction hook.
///
/// Meshes carry no decoded images yet, so this yields nothing and every
/// material slot serializes as -1. Materials that do reference textures are
/// reported so the gap is visible.
fn extract_textures(mesh: &Mesh) -> Vec<TextureData> {
    let referenced = mesh
        .materials()
        .iter()
        .filter(|m| {
            let t = &m.textures;
            t.base_color.is_some() || t.orm.is_some() || t.emissive.is_some() || t.normal.is_some()
        })
        .count();
    if referenced > 0 {
        tracing::warn!(
            mesh = mesh.name(),
            materials = referenced,
            "texture references not packed; slots serialized as -1"
        );
    }
    Vec::new()
}
