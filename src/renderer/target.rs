//! Presentation targets for the blit pass.

use std::path::Path;

use super::context::GpuContext;
use crate::util::{Error, Result};

/// A texture acquired for one frame.
pub struct TargetFrame {
    pub view: wgpu::TextureView,
    surface: Option<wgpu::SurfaceTexture>,
}

impl TargetFrame {
    /// Present the frame; a no-op for offscreen targets.
    pub fn present(self) {
        if let Some(surface) = self.surface {
            surface.present();
        }
    }
}

/// Something the renderer can blit its output into.
pub trait FrameTarget: Send {
    fn format(&self) -> wgpu::TextureFormat;
    fn size(&self) -> (u32, u32);
    fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32);
    /// Acquire the texture for the next frame.
    fn acquire(&mut self, ctx: &GpuContext) -> Result<TargetFrame>;
}

/// Render-to-texture target with PNG readback.
pub struct OffscreenTarget {
    texture: wgpu::Texture,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

impl OffscreenTarget {
    pub const DEFAULT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> Self {
        let format = Self::DEFAULT_FORMAT;
        let (width, height) = (width.max(1), height.max(1));
        Self {
            texture: Self::create_texture(&ctx.device, format, width, height),
            format,
            width,
            height,
        }
    }

    fn create_texture(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen_target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    /// Copy the target back to the CPU as RGBA8.
    pub fn read_pixels(&self, ctx: &GpuContext) -> Result<image::RgbaImage> {
        // bytes_per_row must be aligned to 256 (COPY_BYTES_PER_ROW_ALIGNMENT)
        let unpadded = self.width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("offscreen_readback"),
            size: padded as u64 * self.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("offscreen_readback") });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        ctx.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        ctx.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| Error::Readback(e.to_string()))?;
        rx.recv()
            .map_err(|e| Error::Readback(e.to_string()))?
            .map_err(|e| Error::Readback(e.to_string()))?;

        let mut pixels = Vec::with_capacity((unpadded * self.height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded as usize).take(self.height as usize) {
                pixels.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        buffer.unmap();
        buffer.destroy();

        image::RgbaImage::from_raw(self.width, self.height, pixels)
            .ok_or_else(|| Error::Readback("pixel buffer size mismatch".into()))
    }

    pub fn save_png(&self, ctx: &GpuContext, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.read_pixels(ctx)?
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| Error::Image(e.to_string()))?;
        tracing::info!("wrote {}", path.display());
        Ok(())
    }
}

impl FrameTarget for OffscreenTarget {
    fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.texture.destroy();
        self.texture = Self::create_texture(&ctx.device, self.format, width, height);
        self.width = width;
        self.height = height;
    }

    fn acquire(&mut self, _ctx: &GpuContext) -> Result<TargetFrame> {
        Ok(TargetFrame {
            view: self.texture.create_view(&wgpu::TextureViewDescriptor::default()),
            surface: None,
        })
    }
}

/// Window surface target.
pub struct SurfaceTarget {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl SurfaceTarget {
    /// Configure `surface` for `ctx`, preferring an sRGB format.
    pub fn new(ctx: &GpuContext, surface: wgpu::Surface<'static>, width: u32, height: u32) -> Result<Self> {
        let caps = surface.get_capabilities(&ctx.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| Error::Surface("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&ctx.device, &config);
        Ok(Self { surface, config })
    }
}

impl FrameTarget for SurfaceTarget {
    fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&ctx.device, &self.config);
    }

    fn acquire(&mut self, ctx: &GpuContext) -> Result<TargetFrame> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&ctx.device, &self.config);
                return Err(Error::Surface("surface lost, reconfigured".into()));
            }
            Err(e) => return Err(Error::Surface(e.to_string())),
        };
        Ok(TargetFrame {
            view: frame.texture.create_view(&wgpu::TextureViewDescriptor::default()),
            surface: Some(frame),
        })
    }
}
