//! Per-frame command encoding.

use restir_shaders::{workgroup_count, Pass};

use super::resources::GpuResources;
use super::Pipelines;

/// Compute passes in order, then the result copy and the blit.
pub(crate) fn encode_frame(
    encoder: &mut wgpu::CommandEncoder,
    pipelines: &Pipelines,
    resources: &GpuResources,
    target: &wgpu::TextureView,
) {
    let (width, height) = resources.size;
    let (wg_x, wg_y) = workgroup_count(width, height);

    for pass in Pass::ALL {
        let bind_group = match pass {
            Pass::GBuffer => &resources.bind_groups.gbuffer,
            Pass::ReservoirInit => &resources.bind_groups.reservoir_init,
            Pass::FinalShading => &resources.bind_groups.final_shading,
        };
        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(pass.label()),
            timestamp_writes: None,
        });
        cpass.set_pipeline(pipelines.compute(pass));
        cpass.set_bind_group(0, bind_group, &[]);
        cpass.dispatch_workgroups(wg_x, wg_y, 1);
    }

    // Next frame's history
    encoder.copy_texture_to_texture(
        resources.result.texture.as_image_copy(),
        resources.scene_texture.texture.as_image_copy(),
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("blit_pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    rpass.set_pipeline(&pipelines.blit);
    rpass.set_bind_group(0, &resources.bind_groups.blit, &[]);
    rpass.draw(0..3, 0..1); // fullscreen triangle
}
