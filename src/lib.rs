//! # lightsim
//!
//! Real-time ReSTIR direct-illumination renderer built on wgpu compute shaders.
//!
//! The crate is split into a CPU-side scene compiler and a GPU-side render
//! orchestrator. The compiler builds a binned-SAH BVH per submesh, serializes
//! meshes, materials and lights into three tightly packed `u32` buffers and
//! records every section offset. The orchestrator uploads those buffers and
//! drives the per-frame pass sequence with progressive accumulation.
//!
//! ## Modules
//!
//! - [`util`] - Error handling
//! - [`pack`] - Buffer packer and section layout builder
//! - [`bvh`] - Binned SAH BVH builder
//! - [`mesh`] - Mesh model, resource manager, procedural mesh loader
//! - [`serialize`] - Mesh serializer and scene compiler
//! - [`scene`] - World, lights, scene descriptors and scene manager
//! - [`camera`] - Fly camera and input controller
//! - [`renderer`] - GPU render pipeline orchestrator (feature `gpu`)
//! - [`engine`] - Render loop facade (feature `gpu`)
//! - [`settings`] - Persistent configuration
//!
//! ## Example
//!
//! ```ignore
//! use lightsim::prelude::*;
//!
//! let mut resources = ResourceManager::new(Box::new(ProceduralLoader), 4);
//! let mut world = World::new();
//! let mut scenes = SceneManager::with_builtin_scenes();
//! scenes.load_scene(Some("dummy_scene_1"), &mut world, &mut resources)?;
//!
//! let compiled = compile_scene(&world, &resources);
//! println!("{} instances, {} lights", compiled.instance_count, compiled.light_count);
//! ```

pub mod util;
pub mod pack;
pub mod bvh;
pub mod mesh;
pub mod serialize;
pub mod scene;
pub mod camera;
pub mod settings;

// GPU orchestration (optional, enabled with "gpu" feature)
#[cfg(feature = "gpu")]
pub mod renderer;
#[cfg(feature = "gpu")]
pub mod engine;

pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result};
    pub use crate::pack::{merge, BufferLayout, LayoutBuilder, Section, SectionRange};
    pub use crate::bvh::{build, Aabb, Bvh, BvhNode, Permutation};
    pub use crate::mesh::{Material, Mesh, MeshData, MeshLoader, ProceduralLoader, ResourceManager, Submesh, Vertex};
    pub use crate::serialize::{compile_scene, serialize_mesh, CompiledScene, SceneOffsets};
    pub use crate::scene::{AssetDescriptor, Instance, Light, LightKind, SceneDescriptor, SceneManager, World};
    pub use crate::camera::{Camera, InputController, Key};
    pub use crate::settings::Settings;
    #[cfg(feature = "gpu")]
    pub use crate::renderer::{FrameTarget, GpuContext, OffscreenTarget, Renderer, RendererState};
    #[cfg(feature = "gpu")]
    pub use crate::engine::Engine;
}
