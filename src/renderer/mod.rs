//! GPU render pipeline orchestrator.
//!
//! Owns every GPU allocation for the current scene. `initialize` is always a
//! cold rebuild: existing resources are destroyed, the World is recompiled,
//! buffers are uploaded and pipelines recreated. Each frame then writes one
//! uniform block and encodes the compute passes, the history copy and the
//! blit into a single command buffer.
//!
//! ```ignore
//! let ctx = Arc::new(GpuContext::headless()?);
//! let mut target = OffscreenTarget::new(&ctx, 640, 360);
//! let mut renderer = Renderer::new(ctx.clone(), RenderOptions::default());
//! renderer.initialize(&world, &meshes, target.format(), 640, 360)?;
//! renderer.update(&camera, false)?;
//! renderer.render(&mut target);
//! ```

mod context;
mod passes;
mod resources;
mod target;
mod uniforms;

use std::sync::Arc;

use restir_shaders::{create_bind_group_layouts, create_blit_pipeline, create_compute_pipeline, BindGroupLayouts, Pass};

use crate::camera::Camera;
use crate::mesh::ResourceManager;
use crate::scene::World;
use crate::serialize::{compile_scene, SceneOffsets};
use crate::util::{Error, Result};

pub use context::GpuContext;
pub use resources::{GpuResources, ResourceLedger};
pub use target::{FrameTarget, OffscreenTarget, SurfaceTarget, TargetFrame};
pub use uniforms::{frame_uniforms, FrameCounter, RenderOptions};

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Ready,
    Rendering,
}

/// Every pipeline a frame needs.
pub struct Pipelines {
    gbuffer: wgpu::ComputePipeline,
    reservoir_init: wgpu::ComputePipeline,
    final_shading: wgpu::ComputePipeline,
    blit: wgpu::RenderPipeline,
    blit_format: wgpu::TextureFormat,
}

impl Pipelines {
    /// Compile all pipelines concurrently; returns once every one exists.
    #[tracing::instrument(skip(device, layouts))]
    fn create(device: &wgpu::Device, layouts: &BindGroupLayouts, format: wgpu::TextureFormat) -> Self {
        let ((gbuffer, reservoir_init), (final_shading, blit)) = rayon::join(
            || {
                rayon::join(
                    || create_compute_pipeline(device, Pass::GBuffer, layouts),
                    || create_compute_pipeline(device, Pass::ReservoirInit, layouts),
                )
            },
            || {
                rayon::join(
                    || create_compute_pipeline(device, Pass::FinalShading, layouts),
                    || create_blit_pipeline(device, &layouts.blit, format),
                )
            },
        );
        Self {
            gbuffer,
            reservoir_init,
            final_shading,
            blit,
            blit_format: format,
        }
    }

    fn compute(&self, pass: Pass) -> &wgpu::ComputePipeline {
        match pass {
            Pass::GBuffer => &self.gbuffer,
            Pass::ReservoirInit => &self.reservoir_init,
            Pass::FinalShading => &self.final_shading,
        }
    }
}

/// Render pipeline orchestrator.
pub struct Renderer {
    ctx: Arc<GpuContext>,
    layouts: BindGroupLayouts,
    pipelines: Option<Pipelines>,
    resources: Option<GpuResources>,
    offsets: SceneOffsets,
    ledger: ResourceLedger,
    counter: FrameCounter,
    options: RenderOptions,
    state: RendererState,
    last_frame_index: Option<u32>,
}

impl Renderer {
    pub fn new(ctx: Arc<GpuContext>, options: RenderOptions) -> Self {
        let layouts = create_bind_group_layouts(&ctx.device);
        Self {
            ctx,
            layouts,
            pipelines: None,
            resources: None,
            offsets: SceneOffsets::default(),
            ledger: ResourceLedger::new(),
            counter: FrameCounter::new(),
            options,
            state: RendererState::Uninitialized,
            last_frame_index: None,
        }
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state != RendererState::Uninitialized
    }

    /// Allocation counters, for leak checks across re-initialization.
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Section offsets of the uploaded scene.
    pub fn offsets(&self) -> SceneOffsets {
        self.offsets
    }

    /// Frames accumulated since the last reset.
    pub fn frame_count(&self) -> u32 {
        self.counter.current()
    }

    /// Frame index written by the most recent `update`.
    pub fn last_frame_index(&self) -> Option<u32> {
        self.last_frame_index
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    /// Changing bounce or sample counts invalidates accumulated samples.
    pub fn set_options(&mut self, options: RenderOptions) {
        if options != self.options {
            self.options = options;
            self.counter.reset();
        }
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.resources.as_ref().map(|r| r.size)
    }

    /// Discard accumulated history; the next frame starts from scratch.
    pub fn reset_accumulation(&mut self) {
        self.counter.reset();
    }

    /// Destroy, recompile and upload the World, then rebuild pipelines.
    #[tracing::instrument(skip(self, world, meshes))]
    pub fn initialize(
        &mut self,
        world: &World,
        meshes: &ResourceManager,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.destroy();

        if width == 0 || height == 0 {
            return Err(Error::other(format!("invalid canvas size {width}x{height}")));
        }

        let compiled = compile_scene(world, meshes);
        if compiled.dropped_instances > 0 {
            tracing::warn!("{} instance(s) dropped for missing meshes", compiled.dropped_instances);
        }

        let max_binding = self.ctx.device.limits().max_storage_buffer_binding_size as u64;
        for (name, words) in [
            ("scene", compiled.scene.len()),
            ("geometry", compiled.geometry.len()),
            ("accel", compiled.accel.len()),
        ] {
            let bytes = words as u64 * 4;
            if bytes > max_binding {
                return Err(Error::other(format!(
                    "{name} buffer is {bytes} bytes, device limit is {max_binding}"
                )));
            }
        }

        let pipelines = Pipelines::create(&self.ctx.device, &self.layouts, format);
        let resources = GpuResources::new(&self.ctx.device, &self.layouts, &compiled, width, height, &self.ledger);

        self.offsets = compiled.offsets();
        self.pipelines = Some(pipelines);
        self.resources = Some(resources);
        self.counter.reset();
        self.state = RendererState::Ready;

        tracing::info!(
            instances = compiled.instance_count,
            lights = compiled.light_count,
            meshes = compiled.mesh_count,
            bytes = compiled.total_bytes(),
            "renderer initialized at {width}x{height}"
        );
        Ok(())
    }

    /// Release every GPU allocation and return to `Uninitialized`.
    pub fn destroy(&mut self) {
        if self.resources.is_some() || self.pipelines.is_some() {
            tracing::debug!("destroying renderer resources");
        }
        self.resources = None;
        self.pipelines = None;
        self.offsets = SceneOffsets::default();
        self.counter.reset();
        self.last_frame_index = None;
        self.state = RendererState::Uninitialized;
    }

    /// `Ready -> Rendering`.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            RendererState::Uninitialized => Err(Error::NotInitialized),
            _ => {
                self.state = RendererState::Rendering;
                Ok(())
            }
        }
    }

    /// `Rendering -> Ready`.
    pub fn stop(&mut self) {
        if self.state == RendererState::Rendering {
            self.state = RendererState::Ready;
        }
    }

    /// Write the uniform block for the next frame.
    ///
    /// `camera_moved` discards accumulated history so the frame is rendered
    /// with index 0.
    pub fn update(&mut self, camera: &Camera, camera_moved: bool) -> Result<()> {
        if camera_moved {
            self.counter.reset();
        }
        let resources = self.resources.as_ref().ok_or(Error::NotInitialized)?;
        let frame_index = self.counter.advance();
        let uniforms = frame_uniforms(camera, &self.offsets, self.options, resources.size, frame_index);
        self.ctx
            .queue
            .write_buffer(&resources.uniforms, 0, bytemuck::bytes_of(&uniforms));
        self.last_frame_index = Some(frame_index);
        Ok(())
    }

    /// Encode and submit one frame. Failures are logged and the frame skipped.
    pub fn render(&mut self, target: &mut dyn FrameTarget) -> bool {
        match self.render_frame(target) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("frame skipped: {e}");
                false
            }
        }
    }

    fn render_frame(&mut self, target: &mut dyn FrameTarget) -> Result<()> {
        let (Some(pipelines), Some(resources)) = (&self.pipelines, &self.resources) else {
            return Err(Error::NotInitialized);
        };
        if target.format() != pipelines.blit_format {
            return Err(Error::Surface(format!(
                "target format {:?} does not match pipeline format {:?}",
                target.format(),
                pipelines.blit_format
            )));
        }

        let frame = target.acquire(&self.ctx)?;
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("frame_encoder") });
        passes::encode_frame(&mut encoder, pipelines, resources, &frame.view);
        self.ctx.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.destroy();
    }
}
