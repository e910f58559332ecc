//! Scene model: World, lights, descriptors and scene management.

pub mod builtin;
pub mod descriptor;
pub mod light;
pub mod manager;
pub mod world;

pub use descriptor::{AssetDescriptor, AssetKind, LightParams, SceneDescriptor, SceneEntry, TransformDescriptor};
pub use light::{light_cdf, GpuLight, Light, LightKind};
pub use manager::{SceneLoadReport, SceneManager};
pub use world::{Instance, LoadReport, PackedInstance, PackedWorld, World};
