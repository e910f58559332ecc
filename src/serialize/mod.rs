//! Scene serialization into GPU word buffers.
//!
//! ## Architecture
//! ```text
//! World::pack_for_render → meshes used (deduplicated) → serialize_mesh (per mesh, parallel)
//!     → merge across meshes → LayoutBuilder × 3 → Scene / Geometry / Acceleration buffers
//! ```
//!
//! All three buffers are `u32` word arrays; floats are stored as their bit
//! patterns and read back with `bitcast` on the GPU. Offsets are element
//! indices in the unit of their section (vertices, nodes, materials, ...),
//! section offsets are word offsets.

mod mesh;
mod scene;

pub use mesh::{serialize_mesh, GpuMaterial, GpuMeshDescriptor, MeshSections, SubmeshRoot, TextureData};
pub use scene::{compile_scene, CompiledScene, GpuInstance, SceneOffsets};
