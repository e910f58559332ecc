//! Renderer lifecycle tests. Skipped when no GPU adapter is available.
#![cfg(feature = "gpu")]

use std::sync::Arc;

use glam::Vec3;
use lightsim::prelude::*;
use lightsim::renderer::RenderOptions;

fn context() -> Option<Arc<GpuContext>> {
    match GpuContext::headless() {
        Ok(ctx) => Some(Arc::new(ctx)),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

fn default_scene() -> (World, ResourceManager) {
    let mut resources = ResourceManager::new(Box::new(ProceduralLoader), 4);
    let mut world = World::new();
    SceneManager::with_builtin_scenes()
        .load_scene(None, &mut world, &mut resources)
        .unwrap();
    (world, resources)
}

#[test]
fn initialize_twice_releases_first_allocation() {
    let Some(ctx) = context() else { return };
    let (world, resources) = default_scene();
    let target = OffscreenTarget::new(&ctx, 64, 48);
    let mut renderer = Renderer::new(ctx.clone(), RenderOptions::default());
    assert_eq!(renderer.state(), RendererState::Uninitialized);

    renderer.initialize(&world, &resources, target.format(), 64, 48).unwrap();
    assert_eq!(renderer.state(), RendererState::Ready);
    let buffers = renderer.ledger().live_buffers();
    let textures = renderer.ledger().live_textures();
    assert!(buffers > 0 && textures > 0);

    // Simulated resize: full destroy-then-rebuild
    renderer.initialize(&world, &resources, target.format(), 32, 32).unwrap();
    assert_eq!(renderer.ledger().live_buffers(), buffers);
    assert_eq!(renderer.ledger().live_textures(), textures);
    assert_eq!(renderer.size(), Some((32, 32)));

    renderer.destroy();
    assert_eq!(renderer.ledger().live_buffers(), 0);
    assert_eq!(renderer.ledger().live_textures(), 0);
    assert_eq!(renderer.state(), RendererState::Uninitialized);
}

#[test]
fn camera_movement_resets_frame_counter() {
    let Some(ctx) = context() else { return };
    let (world, resources) = default_scene();
    let mut target = OffscreenTarget::new(&ctx, 32, 32);
    let mut renderer = Renderer::new(ctx.clone(), RenderOptions::default());
    renderer.initialize(&world, &resources, target.format(), 32, 32).unwrap();

    let mut camera = Camera::new(32, 32);
    for expected in 0..3 {
        renderer.update(&camera, false).unwrap();
        assert_eq!(renderer.last_frame_index(), Some(expected));
        assert!(renderer.render(&mut target));
    }

    camera.translate(Vec3::X * 0.1);
    renderer.update(&camera, true).unwrap();
    assert_eq!(renderer.last_frame_index(), Some(0));
    assert!(renderer.render(&mut target));

    renderer.update(&camera, false).unwrap();
    assert_eq!(renderer.last_frame_index(), Some(1));
}

#[test]
fn update_before_initialize_is_an_error_and_render_skips() {
    let Some(ctx) = context() else { return };
    let mut target = OffscreenTarget::new(&ctx, 16, 16);
    let mut renderer = Renderer::new(ctx.clone(), RenderOptions::default());
    assert!(matches!(
        renderer.update(&Camera::default(), false),
        Err(Error::NotInitialized)
    ));
    assert!(!renderer.render(&mut target));
    assert!(renderer.start().is_err());
}

#[test]
fn offscreen_frame_reads_back() {
    let Some(ctx) = context() else { return };
    let (world, resources) = default_scene();
    let mut target = OffscreenTarget::new(&ctx, 40, 30);
    let mut renderer = Renderer::new(ctx.clone(), RenderOptions::default());
    renderer.initialize(&world, &resources, target.format(), 40, 30).unwrap();

    let camera = Camera::new(40, 30);
    for _ in 0..2 {
        renderer.update(&camera, false).unwrap();
        assert!(renderer.render(&mut target));
    }

    let image = target.read_pixels(&ctx).unwrap();
    assert_eq!(image.dimensions(), (40, 30));
    assert!(image.pixels().all(|p| p.0[3] == 255));
}

#[test]
fn engine_switches_scenes_and_keeps_state_on_unknown_id() {
    let Some(ctx) = context() else { return };
    let target = OffscreenTarget::new(&ctx, 32, 24);
    let mut engine = Engine::new(ctx, target, Settings::default());

    let report = engine.initialize(32, 24, None).unwrap();
    assert_eq!(report.scene_id, "dummy_scene_1");
    assert!(engine.step(1.0 / 60.0));

    assert!(engine.switch_scene("nope").is_err());
    assert_eq!(engine.current_scene().as_deref(), Some("dummy_scene_1"));
    assert_eq!(engine.state(), RendererState::Ready);

    let report = engine.switch_scene("dummy_scene_2").unwrap();
    assert_eq!(report.scene_id, "dummy_scene_2");
    assert_eq!(engine.frame_count(), 0);
    assert!(engine.step(1.0 / 60.0));

    engine.dispose();
    assert_eq!(engine.state(), RendererState::Uninitialized);
    assert_eq!(engine.ledger().live_buffers(), 0);
}

#[test]
fn engine_render_thread_starts_and_stops() {
    let Some(ctx) = context() else { return };
    let target = OffscreenTarget::new(&ctx, 16, 16);
    let mut settings = Settings::default();
    settings.target_fps = 120.0;
    let mut engine = Engine::new(ctx, target, settings);
    engine.initialize(16, 16, None).unwrap();

    let frames = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = frames.clone();
    engine.on_frame_time(move |_| {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });

    engine.start().unwrap();
    assert_eq!(engine.state(), RendererState::Rendering);
    std::thread::sleep(std::time::Duration::from_millis(200));
    engine.stop();
    assert_eq!(engine.state(), RendererState::Ready);
    assert!(frames.load(std::sync::atomic::Ordering::SeqCst) > 0);
}

#[test]
fn bvh_depth_cap_fits_traversal_stack() {
    assert_eq!(lightsim::bvh::MAX_DEPTH, restir_shaders::TRAVERSAL_STACK_SIZE as usize);
}
