//! Uniform blocks shared by every compute pass.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Per-frame uniform block (256 bytes).
///
/// Every `*_offset` is a word offset into the buffer holding that section.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub resolution: [u32; 2],
    pub max_bounce: u32,
    pub spp: u32,
    pub inv_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    /// Frames accumulated before this one; 0 discards history.
    pub frame_index: u32,
    // Scene buffer
    pub instance_offset: u32,
    pub mesh_descriptor_offset: u32,
    pub material_offset: u32,
    pub light_offset: u32,
    pub light_cdf_offset: u32,
    // Geometry buffer
    pub vertex_offset: u32,
    pub index_offset: u32,
    pub submesh_root_offset: u32,
    pub primitive_material_offset: u32,
    // Acceleration buffer
    pub tlas_offset: u32,
    pub blas_offset: u32,
    pub instance_count: u32,
    pub light_count: u32,
    pub _pad: [u32; 27],
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl FrameUniforms {
    pub const SIZE: u64 = 256;

    pub fn set_camera(&mut self, inv_view_proj: Mat4, position: Vec3) {
        self.inv_view_proj = inv_view_proj.to_cols_array_2d();
        self.camera_pos = position.to_array();
    }
}
