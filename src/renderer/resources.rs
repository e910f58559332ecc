//! GPU-side buffers, textures and bind groups for one initialized scene.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use restir_shaders::{BindGroupLayouts, FrameUniforms, HDR_FORMAT, RESERVOIR_SIZE};
use wgpu::util::DeviceExt;

use crate::serialize::CompiledScene;

/// Live GPU allocation counts, shared with whoever needs to audit leaks.
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    buffers: Arc<AtomicUsize>,
    textures: Arc<AtomicUsize>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.load(Ordering::Acquire)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.load(Ordering::Acquire)
    }

    fn add(&self, buffers: usize, textures: usize) {
        self.buffers.fetch_add(buffers, Ordering::AcqRel);
        self.textures.fetch_add(textures, Ordering::AcqRel);
    }

    fn release(&self, buffers: usize, textures: usize) {
        self.buffers.fetch_sub(buffers, Ordering::AcqRel);
        self.textures.fetch_sub(textures, Ordering::AcqRel);
    }
}

/// HDR texture plus its default view.
pub struct HdrTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl HdrTexture {
    fn new(device: &wgpu::Device, label: &str, width: u32, height: u32, usage: wgpu::TextureUsages) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: HDR_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Bind groups for every pass, rebuilt with the resources they reference.
pub struct BindGroups {
    pub gbuffer: wgpu::BindGroup,
    pub reservoir_init: wgpu::BindGroup,
    pub final_shading: wgpu::BindGroup,
    pub blit: wgpu::BindGroup,
}

const BUFFER_COUNT: usize = 5;
const TEXTURE_COUNT: usize = 4;

/// Everything `initialize` allocates. Dropping it destroys every allocation.
pub struct GpuResources {
    pub scene: wgpu::Buffer,
    pub geometry: wgpu::Buffer,
    pub accel: wgpu::Buffer,
    pub reservoirs: wgpu::Buffer,
    pub uniforms: wgpu::Buffer,
    /// World position, w = hit flag.
    pub gbuffer_position: HdrTexture,
    /// Shading normal, w = global material index.
    pub gbuffer_normal: HdrTexture,
    /// Accumulated radiance read back by the next frame.
    pub scene_texture: HdrTexture,
    pub result: HdrTexture,
    pub bind_groups: BindGroups,
    pub size: (u32, u32),
    ledger: ResourceLedger,
}

/// Upload a packed `u32` buffer; wgpu refuses zero-sized bindings.
fn storage_buffer(device: &wgpu::Device, label: &str, words: &[u32]) -> wgpu::Buffer {
    let bytes: &[u8] = bytemuck::cast_slice(words);
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: if bytes.is_empty() { &[0u8; 16] } else { bytes },
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
    })
}

fn buffer_entry(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

fn view_entry(binding: u32, view: &wgpu::TextureView) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::TextureView(view),
    }
}

/// Bindings 0-3 (uniforms, scene, geometry, accel) followed by the pass-specific `extra` entries.
fn bind_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    shared: &[&wgpu::Buffer; 4],
    extra: &[wgpu::BindGroupEntry],
) -> wgpu::BindGroup {
    let mut entries: Vec<wgpu::BindGroupEntry> = shared
        .iter()
        .enumerate()
        .map(|(i, buffer)| buffer_entry(i as u32, buffer))
        .collect();
    entries.extend_from_slice(extra);
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

impl GpuResources {
    #[tracing::instrument(skip(device, layouts, compiled, ledger))]
    pub fn new(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        compiled: &CompiledScene,
        width: u32,
        height: u32,
        ledger: &ResourceLedger,
    ) -> Self {
        let (width, height) = (width.max(1), height.max(1));

        let scene = storage_buffer(device, "scene_buffer", &compiled.scene);
        let geometry = storage_buffer(device, "geometry_buffer", &compiled.geometry);
        let accel = storage_buffer(device, "accel_buffer", &compiled.accel);
        let reservoirs = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("reservoir_buffer"),
            size: width as u64 * height as u64 * RESERVOIR_SIZE,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniforms"),
            size: FrameUniforms::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let gbuffer_usage = wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING;
        let gbuffer_position = HdrTexture::new(device, "gbuffer_position", width, height, gbuffer_usage);
        let gbuffer_normal = HdrTexture::new(device, "gbuffer_normal", width, height, gbuffer_usage);
        let scene_texture = HdrTexture::new(
            device,
            "scene_texture",
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        let result = HdrTexture::new(
            device,
            "shading_result",
            width,
            height,
            wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_SRC,
        );
        ledger.add(BUFFER_COUNT, TEXTURE_COUNT);

        let shared = [&uniforms, &scene, &geometry, &accel];
        let group = |label: &str, layout: &wgpu::BindGroupLayout, extra: &[wgpu::BindGroupEntry]| {
            bind_group(device, label, layout, &shared, extra)
        };

        let bind_groups = BindGroups {
            gbuffer: group(
                "gbuffer_bg",
                &layouts.gbuffer,
                &[view_entry(4, &gbuffer_position.view), view_entry(5, &gbuffer_normal.view)],
            ),
            reservoir_init: group(
                "reservoir_init_bg",
                &layouts.reservoir_init,
                &[
                    view_entry(4, &gbuffer_position.view),
                    view_entry(5, &gbuffer_normal.view),
                    buffer_entry(6, &reservoirs),
                ],
            ),
            final_shading: group(
                "final_shading_bg",
                &layouts.final_shading,
                &[
                    view_entry(4, &gbuffer_position.view),
                    view_entry(5, &gbuffer_normal.view),
                    buffer_entry(6, &reservoirs),
                    view_entry(7, &scene_texture.view),
                    view_entry(8, &result.view),
                ],
            ),
            blit: device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("blit_bg"),
                layout: &layouts.blit,
                entries: &[view_entry(0, &scene_texture.view)],
            }),
        };

        tracing::debug!(
            bytes = compiled.total_bytes(),
            reservoir_bytes = reservoirs.size(),
            "GPU resources created"
        );

        Self {
            scene,
            geometry,
            accel,
            reservoirs,
            uniforms,
            gbuffer_position,
            gbuffer_normal,
            scene_texture,
            result,
            bind_groups,
            size: (width, height),
            ledger: ledger.clone(),
        }
    }
}

impl Drop for GpuResources {
    fn drop(&mut self) {
        for buffer in [&self.scene, &self.geometry, &self.accel, &self.reservoirs, &self.uniforms] {
            buffer.destroy();
        }
        for tex in [
            &self.gbuffer_position,
            &self.gbuffer_normal,
            &self.scene_texture,
            &self.result,
        ] {
            tex.texture.destroy();
        }
        self.ledger.release(BUFFER_COUNT, TEXTURE_COUNT);
        tracing::debug!("GPU resources destroyed");
    }
}
