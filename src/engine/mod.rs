//! Engine facade: the surface a host application drives.
//!
//! Bundles the World, mesh resources, scene registry, camera, input and the
//! renderer behind one handle. Frames are produced either by the dedicated
//! render thread (`start`/`stop`) or manually with `step` for headless use.
//!
//! Scene edits, resizes and input events take the same lock the render thread
//! holds while it draws, so they land between frames.

mod render_loop;

use std::sync::Arc;

use glam::Vec3;
use parking_lot::Mutex;

use crate::camera::{Camera, InputController, Key};
use crate::mesh::{ProceduralLoader, ResourceManager};
use crate::renderer::{FrameTarget, GpuContext, RenderOptions, Renderer, RendererState, ResourceLedger};
use crate::scene::{SceneLoadReport, SceneManager, World};
use crate::settings::Settings;
use crate::util::{Error, Result};

pub use render_loop::{LoopCommand, RenderLoop};

/// Called with the frame delta in seconds.
pub type FrameTimeCallback = Box<dyn FnMut(f32) + Send>;
/// Called with the camera world position after each frame.
pub type CameraCallback = Box<dyn FnMut(Vec3) + Send>;

/// State shared between the host thread and the render thread.
struct EngineCore<T: FrameTarget> {
    renderer: Renderer,
    target: T,
    world: World,
    meshes: ResourceManager,
    scenes: SceneManager,
    camera: Camera,
    input: InputController,
    on_frame_time: Option<FrameTimeCallback>,
    on_camera: Option<CameraCallback>,
}

impl<T: FrameTarget> EngineCore<T> {
    /// Cold rebuild of all GPU state at `width x height`.
    fn rebuild(&mut self, width: u32, height: u32) -> Result<()> {
        self.target.resize(self.renderer.context(), width, height);
        self.camera.set_aspect_ratio(width, height);
        let format = self.target.format();
        let was_rendering = self.renderer.state() == RendererState::Rendering;
        self.renderer
            .initialize(&self.world, &self.meshes, format, width, height)?;
        if was_rendering {
            self.renderer.start()?;
        }
        Ok(())
    }

    fn step(&mut self, dt: f32) -> bool {
        let moved = self.input.update(&mut self.camera, dt);
        if let Err(e) = self.renderer.update(&self.camera, moved) {
            tracing::warn!("frame skipped: {e}");
            return false;
        }
        let drawn = self.renderer.render(&mut self.target);

        if let Some(cb) = self.on_frame_time.as_mut() {
            cb(dt);
        }
        if let Some(cb) = self.on_camera.as_mut() {
            cb(self.camera.position());
        }
        drawn
    }
}

/// Host-facing engine handle.
pub struct Engine<T: FrameTarget + 'static> {
    core: Arc<Mutex<EngineCore<T>>>,
    settings: Settings,
    render_loop: Option<RenderLoop>,
}

impl<T: FrameTarget + 'static> Engine<T> {
    /// Engine with the built-in scenes and the procedural mesh loader.
    pub fn new(ctx: Arc<GpuContext>, target: T, settings: Settings) -> Self {
        let meshes = ResourceManager::new(Box::new(ProceduralLoader), settings.bvh_max_leaf_size);
        let mut scenes = SceneManager::with_builtin_scenes();
        if scenes.get(&settings.default_scene).is_some() {
            scenes.set_default(settings.default_scene.clone());
        } else {
            tracing::warn!("default scene '{}' is not registered", settings.default_scene);
        }
        Self::with_resources(ctx, target, settings, scenes, meshes)
    }

    pub fn with_resources(
        ctx: Arc<GpuContext>,
        target: T,
        settings: Settings,
        scenes: SceneManager,
        meshes: ResourceManager,
    ) -> Self {
        let (width, height) = target.size();
        let mut camera = Camera::with_position(width, height, Vec3::from(settings.camera_position));
        camera.set_yaw_degrees(settings.camera_yaw);
        camera.set_pitch_degrees(settings.camera_pitch);
        camera.set_fov_degrees(settings.fov);
        camera.set_clip(settings.near, settings.far);

        let core = EngineCore {
            renderer: Renderer::new(ctx, RenderOptions::from(&settings)),
            target,
            world: World::new(),
            meshes,
            scenes,
            camera,
            input: InputController::new(settings.move_speed, settings.mouse_sensitivity),
            on_frame_time: None,
            on_camera: None,
        };

        Self {
            core: Arc::new(Mutex::new(core)),
            settings,
            render_loop: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Load a scene (default when `scene_id` is `None` or unknown) and build GPU state.
    #[tracing::instrument(skip(self))]
    pub fn initialize(&mut self, width: u32, height: u32, scene_id: Option<&str>) -> Result<SceneLoadReport> {
        let mut core = self.core.lock();
        let core = &mut *core;
        let report = core.scenes.load_scene(scene_id, &mut core.world, &mut core.meshes)?;
        core.rebuild(width, height)?;
        tracing::info!(
            scene = %report.scene_id,
            instances = report.instances,
            lights = report.lights,
            "engine initialized"
        );
        Ok(report)
    }

    /// Full re-initialization at the new size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.core.lock().rebuild(width, height)
    }

    /// Switch scenes. An unknown id leaves the current scene rendering.
    pub fn switch_scene(&mut self, scene_id: &str) -> Result<SceneLoadReport> {
        let mut core = self.core.lock();
        let core = &mut *core;
        let report = core.scenes.switch_scene(scene_id, &mut core.world, &mut core.meshes)?;
        let (width, height) = core.target.size();
        core.rebuild(width, height)?;
        Ok(report)
    }

    /// Start the render thread at the configured frame rate.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.core.lock().renderer.start()?;

        let core = Arc::clone(&self.core);
        let lp = RenderLoop::spawn(self.settings.target_fps, move |dt| {
            core.lock().step(dt);
        })
        .map_err(|e| {
            self.core.lock().renderer.stop();
            Error::Io(e)
        })?;
        self.render_loop = Some(lp);
        Ok(())
    }

    /// Stop the render thread; returns once no frame is in flight.
    pub fn stop(&mut self) {
        if let Some(mut lp) = self.render_loop.take() {
            lp.stop();
        }
        self.core.lock().renderer.stop();
    }

    /// Stop rendering, then release GPU resources and clear the World.
    pub fn dispose(&mut self) {
        self.stop();
        let mut core = self.core.lock();
        core.renderer.destroy();
        core.world.clear();
        core.meshes.clear();
        core.input.reset();
    }

    pub fn is_running(&self) -> bool {
        self.render_loop.as_ref().is_some_and(|lp| lp.is_running())
    }

    pub fn set_target_fps(&mut self, fps: f32) {
        self.settings.target_fps = fps;
        if let Some(lp) = &self.render_loop {
            lp.set_target_fps(fps);
        }
    }

    /// Render one frame on the calling thread.
    pub fn step(&self, dt: f32) -> bool {
        self.core.lock().step(dt)
    }

    pub fn state(&self) -> RendererState {
        self.core.lock().renderer.state()
    }

    pub fn current_scene(&self) -> Option<String> {
        self.core.lock().scenes.current_id().map(str::to_string)
    }

    pub fn camera(&self) -> Camera {
        self.core.lock().camera.clone()
    }

    /// Replace the camera; accumulated history is discarded.
    pub fn set_camera(&self, camera: Camera) {
        let mut core = self.core.lock();
        core.camera = camera;
        core.renderer.reset_accumulation();
    }

    /// Frames accumulated since the last reset.
    pub fn frame_count(&self) -> u32 {
        self.core.lock().renderer.frame_count()
    }

    pub fn ledger(&self) -> ResourceLedger {
        self.core.lock().renderer.ledger().clone()
    }

    /// Register extra scenes or change the default.
    pub fn with_scenes<R>(&self, f: impl FnOnce(&mut SceneManager) -> R) -> R {
        f(&mut self.core.lock().scenes)
    }

    /// Borrow the frame target together with the GPU context, e.g. for readback.
    pub fn with_target<R>(&self, f: impl FnOnce(&T, &GpuContext) -> R) -> R {
        let core = self.core.lock();
        f(&core.target, core.renderer.context().as_ref())
    }

    pub fn on_frame_time(&self, cb: impl FnMut(f32) + Send + 'static) {
        self.core.lock().on_frame_time = Some(Box::new(cb));
    }

    pub fn on_camera_position(&self, cb: impl FnMut(Vec3) + Send + 'static) {
        self.core.lock().on_camera = Some(Box::new(cb));
    }

    // Input events

    pub fn key_down(&self, key: Key) {
        self.core.lock().input.key_down(key);
    }

    pub fn key_up(&self, key: Key) {
        self.core.lock().input.key_up(key);
    }

    pub fn mouse_down(&self, x: f32, y: f32) {
        self.core.lock().input.mouse_down(x, y);
    }

    pub fn mouse_up(&self) {
        self.core.lock().input.mouse_up();
    }

    pub fn mouse_move(&self, x: f32, y: f32) {
        let mut core = self.core.lock();
        let core = &mut *core;
        core.input.mouse_move(&mut core.camera, x, y);
    }

    /// Persist the current camera into the settings file.
    pub fn save_settings(&mut self) {
        let camera = self.camera();
        self.settings.camera_position = camera.position().to_array();
        self.settings.camera_yaw = camera.yaw_degrees();
        self.settings.camera_pitch = camera.pitch_degrees();
        self.settings.fov = camera.fov_degrees();
        self.settings.save();
    }
}

impl<T: FrameTarget + 'static> Drop for Engine<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
