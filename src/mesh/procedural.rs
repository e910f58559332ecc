//! Built-in procedural meshes.
//!
//! Lets the built-in scenes render without an external asset pipeline.
//! Every shape is assembled from axis-aligned quads and boxes.

use glam::Vec3;

use super::{Material, MeshData, MeshLoader, Submesh, Vertex};
use crate::util::{Error, Result};

/// Mesh names produced by [`ProceduralLoader`].
pub const PROCEDURAL_MESHES: &[&str] = &["Cube", "Plane", "Quad", "TestScene", "PureWindow", "Chair"];

/// [`MeshLoader`] that generates a fixed set of named shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProceduralLoader;

impl MeshLoader for ProceduralLoader {
    fn load(&self, name: &str) -> Result<MeshData> {
        let data = match name {
            "Cube" => cube(),
            "Plane" => plane(2.0, 4),
            "Quad" => quad(),
            "TestScene" => test_room(),
            "PureWindow" => window_frame(),
            "Chair" => chair(),
            _ => return Err(Error::MissingMesh(name.to_string())),
        };
        Ok(data)
    }

    fn available(&self) -> Vec<String> {
        PROCEDURAL_MESHES.iter().map(|s| s.to_string()).collect()
    }
}

/// Accumulates quads into submeshes.
struct MeshBuilder {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    submeshes: Vec<Submesh>,
    materials: Vec<Material>,
}

impl MeshBuilder {
    fn new(materials: Vec<Material>) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            submeshes: Vec::new(),
            materials,
        }
    }

    /// Start a new submesh; following geometry uses `material`.
    fn submesh(&mut self, material: u32) -> &mut Self {
        let first = (self.indices.len() / 3) as u32;
        self.submeshes.push(Submesh {
            first_primitive: first,
            primitive_count: 0,
            material,
        });
        self
    }

    /// Quad from four corners in order; winding follows `normal`.
    fn quad(&mut self, corners: [Vec3; 4], normal: Vec3) -> &mut Self {
        let base = self.vertices.len() as u32;
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        for (p, uv) in corners.iter().zip(uvs) {
            self.vertices.push(Vertex::new(p.to_array(), normal.to_array(), uv));
        }
        let face = (corners[1] - corners[0]).cross(corners[2] - corners[0]);
        if face.dot(normal) >= 0.0 {
            self.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        } else {
            self.indices.extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
        }
        if let Some(sm) = self.submeshes.last_mut() {
            sm.primitive_count += 2;
        }
        self
    }

    /// Rectangle centered at `center` spanning `±u` and `±v`.
    fn face(&mut self, center: Vec3, u: Vec3, v: Vec3, normal: Vec3) -> &mut Self {
        self.quad([center - u - v, center + u - v, center + u + v, center - u + v], normal)
    }

    /// Axis-aligned box. `inward` flips the normals (room interiors).
    fn cuboid(&mut self, min: Vec3, max: Vec3, inward: bool) -> &mut Self {
        let c = (min + max) * 0.5;
        let h = (max - min) * 0.5;
        let s = if inward { -1.0 } else { 1.0 };
        for axis in 0..3 {
            let n = Vec3::AXES[axis];
            let u = Vec3::AXES[(axis + 1) % 3] * h[(axis + 1) % 3];
            let v = Vec3::AXES[(axis + 2) % 3] * h[(axis + 2) % 3];
            self.face(c + n * h[axis], u, v, n * s);
            self.face(c - n * h[axis], u, v, -n * s);
        }
        self
    }

    fn finish(self, name: &str) -> MeshData {
        MeshData {
            name: name.to_string(),
            vertices: self.vertices,
            indices: self.indices,
            submeshes: self.submeshes.into_iter().filter(|s| s.primitive_count > 0).collect(),
            materials: self.materials,
        }
    }
}

fn cube() -> MeshData {
    let mut b = MeshBuilder::new(vec![Material::default()]);
    b.submesh(0).cuboid(Vec3::splat(-0.5), Vec3::splat(0.5), false);
    b.finish("Cube")
}

/// Square grid in the XZ plane facing +Y.
fn plane(size: f32, cells: u32) -> MeshData {
    let mut b = MeshBuilder::new(vec![Material::default()]);
    b.submesh(0);
    let step = size / cells as f32;
    let half = size * 0.5;
    for i in 0..cells {
        for j in 0..cells {
            let x0 = -half + i as f32 * step;
            let z0 = -half + j as f32 * step;
            b.quad(
                [
                    Vec3::new(x0, 0.0, z0 + step),
                    Vec3::new(x0 + step, 0.0, z0 + step),
                    Vec3::new(x0 + step, 0.0, z0),
                    Vec3::new(x0, 0.0, z0),
                ],
                Vec3::Y,
            );
        }
    }
    b.finish("Plane")
}

/// Unit quad in the XY plane facing +Z.
fn quad() -> MeshData {
    let mut b = MeshBuilder::new(vec![Material::default()]);
    b.submesh(0)
        .face(Vec3::ZERO, Vec3::X * 0.5, Vec3::Y * 0.5, Vec3::Z);
    b.finish("Quad")
}

/// Open-front room with an accent wall, a pedestal and an emissive ceiling panel.
fn test_room() -> MeshData {
    let min = Vec3::new(-1.5, -1.0, -3.5);
    let max = Vec3::new(1.5, 1.2, 1.5);
    let c = (min + max) * 0.5;
    let h = (max - min) * 0.5;

    let mut b = MeshBuilder::new(vec![
        Material::diffuse("walls", [0.75, 0.75, 0.72]),
        Material::diffuse("accent", [0.7, 0.12, 0.1]),
        Material::emissive("panel", [1.0, 0.95, 0.85], 4.0),
    ]);

    b.submesh(0)
        // floor / ceiling
        .face(Vec3::new(c.x, min.y, c.z), Vec3::X * h.x, Vec3::Z * h.z, Vec3::Y)
        .face(Vec3::new(c.x, max.y, c.z), Vec3::X * h.x, Vec3::Z * h.z, -Vec3::Y)
        // back wall
        .face(Vec3::new(c.x, c.y, min.z), Vec3::X * h.x, Vec3::Y * h.y, Vec3::Z)
        // right wall
        .face(Vec3::new(max.x, c.y, c.z), Vec3::Z * h.z, Vec3::Y * h.y, -Vec3::X)
        .cuboid(Vec3::new(-0.35, -1.0, -2.3), Vec3::new(0.35, -0.3, -1.6), false);

    b.submesh(1)
        .face(Vec3::new(min.x, c.y, c.z), Vec3::Z * h.z, Vec3::Y * h.y, Vec3::X);

    b.submesh(2)
        .face(Vec3::new(0.0, max.y - 0.01, -2.0), Vec3::X * 0.4, Vec3::Z * 0.4, -Vec3::Y);

    b.finish("TestScene")
}

/// Window frame with a mullion cross, in the XY plane at z = -1.45.
///
/// Placed with a 90° Y rotation it sits against the room's accent wall.
fn window_frame() -> MeshData {
    let mut b = MeshBuilder::new(vec![Material::diffuse("frame", [0.35, 0.22, 0.12])]);
    let z = -1.45;
    let (w, t, d) = (0.6, 0.03, 0.03);
    let (y0, y1) = (-0.2, 0.8);
    let ym = (y0 + y1) * 0.5;

    b.submesh(0)
        // sill and head
        .cuboid(Vec3::new(-w, y0 - t, z - d), Vec3::new(w, y0 + t, z + d), false)
        .cuboid(Vec3::new(-w, y1 - t, z - d), Vec3::new(w, y1 + t, z + d), false)
        // jambs
        .cuboid(Vec3::new(-w - t, y0 - t, z - d), Vec3::new(-w + t, y1 + t, z + d), false)
        .cuboid(Vec3::new(w - t, y0 - t, z - d), Vec3::new(w + t, y1 + t, z + d), false)
        // mullions
        .cuboid(Vec3::new(-t, y0, z - d), Vec3::new(t, y1, z + d), false)
        .cuboid(Vec3::new(-w, ym - t, z - d), Vec3::new(w, ym + t, z + d), false);

    b.finish("PureWindow")
}

/// Four-legged chair in centimeters, pivot at the floor.
fn chair() -> MeshData {
    let mut b = MeshBuilder::new(vec![
        Material::diffuse("wood", [0.45, 0.3, 0.18]),
        Material {
            roughness: 0.8,
            ..Material::diffuse("cushion", [0.2, 0.25, 0.45])
        },
    ]);
    let half = 22.5;
    let leg = 2.0;

    b.submesh(0);
    for (x, z) in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)] {
        let cx = x * (half - leg);
        let cz = z * (half - leg);
        b.cuboid(Vec3::new(cx - leg, 0.0, cz - leg), Vec3::new(cx + leg, 42.0, cz + leg), false);
    }
    b.cuboid(Vec3::new(-half, 42.0, half - 4.0), Vec3::new(half, 90.0, half), false);

    b.submesh(1)
        .cuboid(Vec3::new(-half, 42.0, -half), Vec3::new(half, 47.0, half), false);

    b.finish("Chair")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;

    #[test]
    fn test_all_meshes_build() {
        for name in PROCEDURAL_MESHES {
            let data = ProceduralLoader.load(name).unwrap();
            assert_eq!(data.name, *name);
            let mesh = Mesh::build(data, 4).unwrap();
            assert!(mesh.triangle_count() > 0, "{name}");
        }
    }

    #[test]
    fn test_cube_counts() {
        let data = ProceduralLoader.load("Cube").unwrap();
        assert_eq!(data.triangle_count(), 12);
        assert_eq!(data.vertices.len(), 24);
        assert_eq!(data.submeshes.len(), 1);
    }

    #[test]
    fn test_cube_normals_point_outward() {
        let data = ProceduralLoader.load("Cube").unwrap();
        for tri in data.indices.chunks_exact(3) {
            let p: Vec<Vec3> = tri.iter().map(|&i| Vec3::from(data.vertices[i as usize].position)).collect();
            let face = (p[1] - p[0]).cross(p[2] - p[0]);
            let centroid = (p[0] + p[1] + p[2]) / 3.0;
            assert!(face.dot(centroid) > 0.0, "inward-facing triangle");
        }
    }

    #[test]
    fn test_room_has_emissive_submesh() {
        let data = ProceduralLoader.load("TestScene").unwrap();
        assert_eq!(data.submeshes.len(), 3);
        let panel = data.submeshes[2];
        assert!(data.materials[panel.material as usize].is_emissive());
        assert_eq!(panel.primitive_count, 2);
    }

    #[test]
    fn test_unknown_mesh() {
        assert!(matches!(ProceduralLoader.load("Teapot"), Err(Error::MissingMesh(_))));
    }
}
