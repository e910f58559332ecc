//! ReSTIR direct-illumination compute passes for wgpu
//!
//! Every compute pass reads the same three packed `u32` scene buffers
//! (scene, geometry, acceleration) plus a 256-byte [`FrameUniforms`] block.
//! Pass sources are composed from [`shader_lib::COMMON`] and the pass body.
//!
//! ## Passes
//! 1. G-buffer: primary visibility, world position + normal/material
//! 2. Reservoir init: RIS over lights sampled from the luminance CDF
//! 3. Final shading: shadow-tested reservoir sample, progressive average
//! 4. Blit: tone-mapped fullscreen triangle to the presentation target
//!
//! ## Usage
//!
//! ```ignore
//! let layouts = restir_shaders::create_bind_group_layouts(&device);
//! let gbuffer = restir_shaders::create_compute_pipeline(&device, Pass::GBuffer, &layouts);
//! let blit = restir_shaders::create_blit_pipeline(&device, &layouts.blit, format);
//! ```

mod params;

pub use params::FrameUniforms;

/// Workgroup edge length (must match @workgroup_size in the WGSL).
pub const WORKGROUP_SIZE: u32 = 8;

/// BVH traversal stack entries per ray (must match `STACK_SIZE` in the WGSL).
pub const TRAVERSAL_STACK_SIZE: u32 = 64;

/// Reservoir size in bytes (must match the WGSL `Reservoir` struct).
pub const RESERVOIR_SIZE: u64 = 32;

/// Intermediate texture format for G-buffer, accumulation and result.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Shader library modules
pub mod shader_lib {
    pub const COMMON: &str = include_str!("shaders/common.wgsl");
    pub const GBUFFER: &str = include_str!("shaders/gbuffer.wgsl");
    pub const RESERVOIR_INIT: &str = include_str!("shaders/reservoir_init.wgsl");
    pub const FINAL_SHADING: &str = include_str!("shaders/final_shading.wgsl");
    pub const BLIT: &str = include_str!("shaders/blit.wgsl");
}

/// Compute passes in dispatch order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pass {
    GBuffer,
    ReservoirInit,
    FinalShading,
}

impl Pass {
    pub const ALL: [Pass; 3] = [Pass::GBuffer, Pass::ReservoirInit, Pass::FinalShading];

    pub fn label(self) -> &'static str {
        match self {
            Pass::GBuffer => "gbuffer",
            Pass::ReservoirInit => "reservoir_init",
            Pass::FinalShading => "final_shading",
        }
    }

    fn body(self) -> &'static str {
        match self {
            Pass::GBuffer => shader_lib::GBUFFER,
            Pass::ReservoirInit => shader_lib::RESERVOIR_INIT,
            Pass::FinalShading => shader_lib::FINAL_SHADING,
        }
    }

    /// Full WGSL source: common declarations followed by the pass body.
    pub fn source(self) -> String {
        compose(self.body())
    }
}

/// Prepend the common declarations to a pass body.
pub fn compose(body: &str) -> String {
    let mut src = String::with_capacity(shader_lib::COMMON.len() + body.len() + 1);
    src.push_str(shader_lib::COMMON);
    src.push('\n');
    src.push_str(body);
    src
}

/// Bind group layouts, one per pass
pub struct BindGroupLayouts {
    /// 0-3 shared scene bindings, 4-5 G-buffer storage writes
    pub gbuffer: wgpu::BindGroupLayout,
    /// 0-3 shared, 4-5 G-buffer reads, 6 reservoirs (read-write)
    pub reservoir_init: wgpu::BindGroupLayout,
    /// 0-3 shared, 4-5 G-buffer reads, 6 reservoirs, 7 history, 8 result write
    pub final_shading: wgpu::BindGroupLayout,
    /// 0 radiance texture
    pub blit: wgpu::BindGroupLayout,
}

impl BindGroupLayouts {
    pub fn for_pass(&self, pass: Pass) -> &wgpu::BindGroupLayout {
        match pass {
            Pass::GBuffer => &self.gbuffer,
            Pass::ReservoirInit => &self.reservoir_init,
            Pass::FinalShading => &self.final_shading,
        }
    }
}

fn compute_entry(binding: u32, ty: wgpu::BindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty,
        count: None,
    }
}

fn storage_buffer(read_only: bool) -> wgpu::BindingType {
    wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Storage { read_only },
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

fn hdr_read() -> wgpu::BindingType {
    wgpu::BindingType::Texture {
        sample_type: wgpu::TextureSampleType::Float { filterable: false },
        view_dimension: wgpu::TextureViewDimension::D2,
        multisampled: false,
    }
}

fn hdr_write() -> wgpu::BindingType {
    wgpu::BindingType::StorageTexture {
        access: wgpu::StorageTextureAccess::WriteOnly,
        format: HDR_FORMAT,
        view_dimension: wgpu::TextureViewDimension::D2,
    }
}

/// Bindings 0-3: frame uniform, scene, geometry, acceleration.
fn shared_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    vec![
        compute_entry(
            0,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: std::num::NonZeroU64::new(FrameUniforms::SIZE),
            },
        ),
        compute_entry(1, storage_buffer(true)),
        compute_entry(2, storage_buffer(true)),
        compute_entry(3, storage_buffer(true)),
    ]
}

/// Create bind group layouts for every pass
pub fn create_bind_group_layouts(device: &wgpu::Device) -> BindGroupLayouts {
    let layout = |label: &str, extra: Vec<wgpu::BindGroupLayoutEntry>| {
        let mut entries = shared_entries();
        entries.extend(extra);
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        })
    };

    let gbuffer = layout(
        "restir_gbuffer_bgl",
        vec![compute_entry(4, hdr_write()), compute_entry(5, hdr_write())],
    );
    let reservoir_init = layout(
        "restir_reservoir_init_bgl",
        vec![
            compute_entry(4, hdr_read()),
            compute_entry(5, hdr_read()),
            compute_entry(6, storage_buffer(false)),
        ],
    );
    let final_shading = layout(
        "restir_final_shading_bgl",
        vec![
            compute_entry(4, hdr_read()),
            compute_entry(5, hdr_read()),
            compute_entry(6, storage_buffer(true)),
            compute_entry(7, hdr_read()),
            compute_entry(8, hdr_write()),
        ],
    );

    let blit = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("restir_blit_bgl"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: hdr_read(),
            count: None,
        }],
    });

    BindGroupLayouts {
        gbuffer,
        reservoir_init,
        final_shading,
        blit,
    }
}

/// Create the compute pipeline for `pass`
pub fn create_compute_pipeline(device: &wgpu::Device, pass: Pass, layouts: &BindGroupLayouts) -> wgpu::ComputePipeline {
    let label = pass.label();
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(pass.source().into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layouts.for_pass(pass)],
        push_constant_ranges: &[],
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

/// Create the tone-mapping blit pipeline (renders radiance to `format`)
pub fn create_blit_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("restir_blit_shader"),
        source: wgpu::ShaderSource::Wgsl(shader_lib::BLIT.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("restir_blit_pl"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("restir_blit_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Workgroups needed to cover `width x height` pixels.
pub fn workgroup_count(width: u32, height: u32) -> (u32, u32) {
    (width.div_ceil(WORKGROUP_SIZE), height.div_ceil(WORKGROUP_SIZE))
}
