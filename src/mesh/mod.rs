//! Mesh model.
//!
//! A [`MeshData`] is what a loader produces: vertices, a triangle index
//! buffer, submesh ranges and materials in authoring order. [`Mesh::build`]
//! validates it, builds one BVH per submesh and permutes the index buffer
//! into leaf order. After that the mesh is immutable and shared through
//! `Arc` by every instance that references it.

mod procedural;
mod resources;

pub use procedural::ProceduralLoader;
pub use resources::{MeshLoader, ResourceManager};

use bytemuck::{Pod, Zeroable};

use crate::bvh::{self, Aabb, BvhNode, Permutation};
use crate::util::{Error, Result};

/// Interleaved vertex, 8 floats (matches the GPU vertex record).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Alpha handling of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Opaque = 0,
    Mask = 1,
    Blend = 2,
}

/// Optional texture references of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureSlots {
    pub base_color: Option<u32>,
    /// Occlusion / roughness / metalness.
    pub orm: Option<u32>,
    pub emissive: Option<u32>,
    pub normal: Option<u32>,
}

/// Surface material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGBA.
    pub base_color: [f32; 4],
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub metalness: f32,
    pub roughness: f32,
    pub blend_mode: BlendMode,
    /// Only meaningful for [`BlendMode::Mask`].
    pub alpha_cutoff: Option<f32>,
    pub normal_scale: [f32; 2],
    pub ior: f32,
    pub textures: TextureSlots,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: [0.8, 0.8, 0.8, 1.0],
            emissive: [0.0; 3],
            emissive_intensity: 0.0,
            metalness: 0.0,
            roughness: 0.5,
            blend_mode: BlendMode::Opaque,
            alpha_cutoff: None,
            normal_scale: [1.0, 1.0],
            ior: 1.5,
            textures: TextureSlots::default(),
        }
    }
}

impl Material {
    /// Simple diffuse material.
    pub fn diffuse(name: &str, color: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            base_color: [color[0], color[1], color[2], 1.0],
            ..Default::default()
        }
    }

    /// Emissive material.
    pub fn emissive(name: &str, color: [f32; 3], intensity: f32) -> Self {
        Self {
            name: name.to_string(),
            base_color: [0.0, 0.0, 0.0, 1.0],
            emissive: color,
            emissive_intensity: intensity,
            roughness: 1.0,
            ..Default::default()
        }
    }

    pub fn is_emissive(&self) -> bool {
        self.emissive_intensity > 0.0 && self.emissive.iter().any(|&c| c > 0.0)
    }
}

/// Contiguous triangle range bound to one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submesh {
    pub first_primitive: u32,
    pub primitive_count: u32,
    pub material: u32,
}

impl Submesh {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.first_primitive as usize..(self.first_primitive + self.primitive_count) as usize
    }
}

/// Raw mesh as produced by a [`MeshLoader`], in authoring order.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    /// Three indices per triangle.
    pub indices: Vec<u32>,
    /// Must tile `0..triangle_count` in order. Empty means one submesh using material 0.
    pub submeshes: Vec<Submesh>,
    /// Empty means a single default material.
    pub materials: Vec<Material>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Loaded mesh with per-submesh BVHs. Immutable after [`Mesh::build`].
#[derive(Debug, Clone)]
pub struct Mesh {
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    submeshes: Vec<Submesh>,
    materials: Vec<Material>,
    submesh_bvhs: Vec<Vec<BvhNode>>,
    primitive_order: Permutation,
    bounds: Aabb,
}

impl Mesh {
    /// Validate `data`, build the submesh BVHs and permute the index buffer.
    #[tracing::instrument(skip_all, fields(mesh = %data.name, tri_count = data.triangle_count()))]
    pub fn build(data: MeshData, max_leaf_size: usize) -> Result<Self> {
        let MeshData {
            name,
            vertices,
            indices,
            mut submeshes,
            mut materials,
        } = data;

        if indices.is_empty() {
            return Err(Error::invalid_mesh(format!("{name}: no triangles")));
        }
        if indices.len() % 3 != 0 {
            return Err(Error::invalid_mesh(format!(
                "{name}: index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(Error::invalid_mesh(format!(
                "{name}: index {bad} out of range ({} vertices)",
                vertices.len()
            )));
        }

        let tri_count = (indices.len() / 3) as u32;
        if materials.is_empty() {
            materials.push(Material::default());
        }
        if submeshes.is_empty() {
            submeshes.push(Submesh {
                first_primitive: 0,
                primitive_count: tri_count,
                material: 0,
            });
        }

        let mut expected_first = 0u32;
        for (i, sm) in submeshes.iter().enumerate() {
            if sm.first_primitive != expected_first || sm.primitive_count == 0 {
                return Err(Error::invalid_mesh(format!(
                    "{name}: submesh {i} does not continue the primitive range at {expected_first}"
                )));
            }
            if sm.material as usize >= materials.len() {
                return Err(Error::invalid_mesh(format!(
                    "{name}: submesh {i} references material {} of {}",
                    sm.material,
                    materials.len()
                )));
            }
            expected_first = expected_first.checked_add(sm.primitive_count).ok_or_else(|| {
                Error::invalid_mesh(format!("{name}: submesh {i} primitive range overflows"))
            })?;
        }
        if expected_first != tri_count {
            return Err(Error::invalid_mesh(format!(
                "{name}: submeshes cover {expected_first} of {tri_count} triangles"
            )));
        }

        let positions: Vec<[f32; 3]> = vertices.iter().map(|v| v.position).collect();
        let mut permuted = Vec::with_capacity(indices.len());
        let mut primitive_order = Permutation::identity(0);
        let mut submesh_bvhs = Vec::with_capacity(submeshes.len());
        let mut bounds = Aabb::EMPTY;

        for sm in &submeshes {
            let range = sm.range();
            let bvh = bvh::build(&positions, &indices[range.start * 3..range.end * 3], max_leaf_size);
            bounds.grow(&bvh.bounds());
            permuted.extend_from_slice(&bvh.indices);
            primitive_order.extend_offset(bvh.primitive_order());
            submesh_bvhs.push(bvh.nodes);
        }

        tracing::debug!(
            submeshes = submeshes.len(),
            nodes = submesh_bvhs.iter().map(Vec::len).sum::<usize>(),
            "mesh built"
        );

        Ok(Self {
            name,
            vertices,
            indices: permuted,
            submeshes,
            materials,
            submesh_bvhs,
            primitive_order,
            bounds,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Triangle indices in BVH leaf order.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// BVH nodes of one submesh; leaf offsets are relative to the submesh's first primitive.
    pub fn submesh_bvh(&self, submesh: usize) -> &[BvhNode] {
        &self.submesh_bvhs[submesh]
    }

    pub fn submesh_bvhs(&self) -> &[Vec<BvhNode>] {
        &self.submesh_bvhs
    }

    /// Mesh-wide primitive order: position `i` of [`Mesh::indices`] holds original triangle `order[i]`.
    pub fn primitive_order(&self) -> &Permutation {
        &self.primitive_order
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn node_count(&self) -> usize {
        self.submesh_bvhs.iter().map(Vec::len).sum()
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Material index of every triangle in authoring order.
    pub fn original_primitive_materials(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.triangle_count());
        for sm in &self.submeshes {
            out.extend(std::iter::repeat(sm.material).take(sm.primitive_count as usize));
        }
        out
    }

    /// Material index of every triangle in BVH leaf order.
    pub fn primitive_materials(&self) -> Vec<u32> {
        self.primitive_order.apply(&self.original_primitive_materials())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_quads() -> MeshData {
        let v = |x: f32, y: f32| Vertex::new([x, y, 0.0], [0.0, 0.0, 1.0], [x, y]);
        MeshData {
            name: "two_quads".into(),
            vertices: vec![
                v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0),
                v(5.0, 0.0), v(6.0, 0.0), v(6.0, 1.0), v(5.0, 1.0),
            ],
            indices: vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7],
            submeshes: vec![
                Submesh { first_primitive: 0, primitive_count: 2, material: 1 },
                Submesh { first_primitive: 2, primitive_count: 2, material: 0 },
            ],
            materials: vec![Material::default(), Material::diffuse("red", [1.0, 0.0, 0.0])],
        }
    }

    #[test]
    fn test_vertex_is_8_floats() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn test_build_two_submeshes() {
        let mesh = Mesh::build(two_quads(), 1).unwrap();
        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(mesh.submesh_bvhs().len(), 2);
        // Two triangles with leaf size 1: one internal + two leaves each
        assert_eq!(mesh.submesh_bvh(0).len(), 3);
        assert_eq!(mesh.node_count(), 6);
        assert_eq!(mesh.bounds().max[0], 6.0);
        // Submesh permutations never cross submesh boundaries
        let order = mesh.primitive_order().as_slice();
        assert!(order[..2].iter().all(|&p| p < 2));
        assert!(order[2..].iter().all(|&p| p >= 2));
    }

    #[test]
    fn test_primitive_materials_follow_permutation() {
        let mesh = Mesh::build(two_quads(), 1).unwrap();
        assert_eq!(mesh.original_primitive_materials(), vec![1, 1, 0, 0]);
        let permuted = mesh.primitive_materials();
        let original = mesh.original_primitive_materials();
        for (pos, &orig) in mesh.primitive_order().as_slice().iter().enumerate() {
            assert_eq!(permuted[pos], original[orig as usize]);
        }
    }

    #[test]
    fn test_defaults_fill_missing_submesh_and_material() {
        let mut data = two_quads();
        data.submeshes.clear();
        data.materials.clear();
        let mesh = Mesh::build(data, 4).unwrap();
        assert_eq!(mesh.submeshes().len(), 1);
        assert_eq!(mesh.materials().len(), 1);
        assert_eq!(mesh.submeshes()[0].primitive_count, 4);
    }

    #[test]
    fn test_rejects_bad_data() {
        let mut data = two_quads();
        data.indices[5] = 99;
        assert!(matches!(Mesh::build(data, 4), Err(Error::InvalidMesh(_))));

        let mut data = two_quads();
        data.submeshes[1].first_primitive = 3;
        assert!(matches!(Mesh::build(data, 4), Err(Error::InvalidMesh(_))));

        let mut data = two_quads();
        data.submeshes[0].material = 7;
        assert!(Mesh::build(data, 4).is_err());

        let data = MeshData { name: "empty".into(), ..Default::default() };
        assert!(Mesh::build(data, 4).is_err());
    }

    #[test]
    fn test_rejects_overflowing_submesh_range() {
        let mut data = two_quads();
        data.submeshes[1].primitive_count = u32::MAX;
        assert!(matches!(Mesh::build(data, 4), Err(Error::InvalidMesh(_))));
    }
}
