//! Per-frame uniform block assembly and the accumulation counter.

use restir_shaders::FrameUniforms;

use crate::camera::Camera;
use crate::serialize::SceneOffsets;

/// Path tracing knobs that end up in the uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub max_bounce: u32,
    pub samples_per_pixel: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_bounce: 1,
            samples_per_pixel: 1,
        }
    }
}

impl From<&crate::settings::Settings> for RenderOptions {
    fn from(s: &crate::settings::Settings) -> Self {
        Self {
            max_bounce: s.max_bounce,
            samples_per_pixel: s.samples_per_pixel.max(1),
        }
    }
}

/// Progressive accumulation counter.
///
/// The value handed to the shaders is the number of frames already
/// accumulated, so the first frame after a reset sees 0 and discards history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounter {
    frames: u32,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index for the frame being prepared, then count it.
    pub fn advance(&mut self) -> u32 {
        let index = self.frames;
        self.frames = self.frames.saturating_add(1);
        index
    }

    pub fn reset(&mut self) {
        self.frames = 0;
    }

    /// Frames accumulated so far.
    pub fn current(&self) -> u32 {
        self.frames
    }
}

/// Fill the uniform block for one frame.
pub fn frame_uniforms(
    camera: &Camera,
    offsets: &SceneOffsets,
    options: RenderOptions,
    resolution: (u32, u32),
    frame_index: u32,
) -> FrameUniforms {
    let mut u = FrameUniforms {
        resolution: [resolution.0, resolution.1],
        max_bounce: options.max_bounce,
        spp: options.samples_per_pixel.max(1),
        frame_index,
        instance_offset: offsets.instances,
        mesh_descriptor_offset: offsets.mesh_descriptors,
        material_offset: offsets.materials,
        light_offset: offsets.lights,
        light_cdf_offset: offsets.light_cdf,
        vertex_offset: offsets.vertices,
        index_offset: offsets.indices,
        submesh_root_offset: offsets.submesh_roots,
        primitive_material_offset: offsets.primitive_materials,
        tlas_offset: offsets.tlas,
        blas_offset: offsets.blas,
        instance_count: offsets.instance_count,
        light_count: offsets.light_count,
        ..FrameUniforms::default()
    };
    u.set_camera(camera.inverse_view_projection(), camera.position());
    u
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_counter_starts_at_zero() {
        let mut c = FrameCounter::new();
        assert_eq!(c.advance(), 0);
        assert_eq!(c.advance(), 1);
        assert_eq!(c.current(), 2);
        c.reset();
        assert_eq!(c.advance(), 0);
    }

    #[test]
    fn test_uniforms_carry_offsets_and_camera() {
        let mut camera = Camera::new(64, 32);
        camera.set_position(Vec3::new(1.0, 2.0, 3.0));
        let offsets = SceneOffsets {
            materials: 40,
            lights: 60,
            light_cdf: 80,
            blas: 7,
            instance_count: 1,
            light_count: 2,
            ..Default::default()
        };
        let u = frame_uniforms(
            &camera,
            &offsets,
            RenderOptions {
                max_bounce: 2,
                samples_per_pixel: 0,
            },
            (64, 32),
            5,
        );
        assert_eq!(u.resolution, [64, 32]);
        assert_eq!(u.max_bounce, 2);
        assert_eq!(u.spp, 1);
        assert_eq!(u.frame_index, 5);
        assert_eq!(u.material_offset, 40);
        assert_eq!(u.light_cdf_offset, 80);
        assert_eq!(u.blas_offset, 7);
        assert_eq!(u.light_count, 2);
        assert_eq!(u.camera_pos, [1.0, 2.0, 3.0]);
        assert_eq!(u.inv_view_proj, camera.inverse_view_projection().to_cols_array_2d());
    }
}
