//! lightsim CLI - headless rendering and scene inspection.

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use lightsim::mesh::{ProceduralLoader, ResourceManager};
use lightsim::scene::{SceneDescriptor, SceneManager, World};
use lightsim::serialize::compile_scene;
use lightsim::settings::Settings;

/// Install the fmt subscriber; `LIGHTSIM_TRACE=1` adds a Chrome trace layer
/// writing `trace.json`.
#[cfg(feature = "chrome-trace")]
fn init_tracing(default_level: &str) -> Option<tracing_chrome::FlushGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt = tracing_subscriber::fmt::layer().with_target(false);

    let (chrome, guard) = if env::var("LIGHTSIM_TRACE").ok().as_deref() == Some("1") {
        let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new().file("trace.json").build();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };
    let _ = tracing_subscriber::registry().with(filter).with(fmt).with(chrome).try_init();
    guard
}

#[cfg(not(feature = "chrome-trace"))]
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt = tracing_subscriber::fmt::layer().with_target(false);
    let _ = tracing_subscriber::registry().with(filter).with(fmt).try_init();
}

/// Options shared by `render` and `inspect`.
#[derive(Debug, Default)]
struct SceneArgs {
    scene: Option<String>,
    scene_file: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    frames: Option<u32>,
    out: Option<PathBuf>,
}

fn parse_scene_args(args: &[&str]) -> anyhow::Result<SceneArgs> {
    let mut parsed = SceneArgs::default();
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        let mut value = |name: &str| {
            it.next()
                .map(|v| v.to_string())
                .with_context(|| format!("{name} expects a value"))
        };
        match *arg {
            "--scene" => parsed.scene = Some(value("--scene")?),
            "--scene-file" => parsed.scene_file = Some(PathBuf::from(value("--scene-file")?)),
            "--width" => parsed.width = Some(value("--width")?.parse().context("--width")?),
            "--height" => parsed.height = Some(value("--height")?.parse().context("--height")?),
            "--frames" => parsed.frames = Some(value("--frames")?.parse().context("--frames")?),
            "--out" | "-o" => parsed.out = Some(PathBuf::from(value("--out")?)),
            other => bail!("unknown option: {other}"),
        }
    }
    Ok(parsed)
}

/// Register `--scene-file` (if any) and return the scene id to load.
fn resolve_scene(scenes: &mut SceneManager, args: &SceneArgs) -> anyhow::Result<Option<String>> {
    if let Some(path) = &args.scene_file {
        let desc = SceneDescriptor::load(path).with_context(|| format!("reading {}", path.display()))?;
        let id = desc.id.clone();
        scenes.register(desc);
        if args.scene.is_none() {
            return Ok(Some(id));
        }
    }
    Ok(args.scene.clone())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("lightsim");

    // Parse global flags
    let mut level = "info";
    let mut filtered: Vec<&str> = Vec::new();
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "warn",
            _ => filtered.push(arg),
        }
    }
    let _guard = init_tracing(level);

    let Some((cmd, rest)) = filtered.split_first() else {
        print_usage(prog);
        return;
    };

    let result = match *cmd {
        "render" | "r" => cmd_render(rest),
        "scenes" | "ls" => cmd_scenes(),
        "inspect" | "i" => cmd_inspect(rest),
        "version" | "-V" | "--version" => {
            println!(
                "lightsim {} (built {} {})",
                env!("CARGO_PKG_VERSION"),
                env!("LIGHTSIM_BUILD_DATE"),
                env!("LIGHTSIM_BUILD_TIME")
            );
            Ok(())
        }
        "help" | "h" | "-h" | "--help" => {
            print_usage(prog);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage(prog);
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage(prog: &str) {
    println!("lightsim - ReSTIR direct-illumination renderer");
    println!();
    println!("Usage: {prog} [options] <command> [args]");
    println!();
    println!("Commands:");
    println!("  r, render    Render a scene headless and write a PNG");
    println!("  ls, scenes   List built-in scenes");
    println!("  i, inspect   Compile a scene and print buffer layouts (no GPU)");
    println!("  version      Show version and build date");
    println!("  h, help      Show this help");
    println!();
    println!("Scene arguments:");
    println!("  --scene ID           Scene id (default from settings)");
    println!("  --scene-file PATH    Load a scene descriptor from JSON");
    println!("  --width W --height H Canvas size (render only)");
    println!("  --frames N           Frames to accumulate (render only, default 16)");
    println!("  -o, --out FILE       Output PNG (render only, default render.png)");
    println!();
    println!("Options:");
    println!("  -v, --verbose  Debug output");
    println!("  -vv, --trace   Trace output (very verbose)");
    println!("  -q, --quiet    Warnings only");
    println!();
    println!("Environment:");
    println!("  RUST_LOG         Overrides the log filter");
    println!("  LIGHTSIM_TRACE=1 Write a Chrome trace to trace.json");
}

fn cmd_scenes() -> anyhow::Result<()> {
    let scenes = SceneManager::with_builtin_scenes();
    for desc in scenes.scenes() {
        let marker = if desc.id == scenes.default_id() { "*" } else { " " };
        println!("{marker} {:<16} {:<20} {} assets", desc.id, desc.name, desc.assets.len());
    }
    Ok(())
}

fn cmd_inspect(args: &[&str]) -> anyhow::Result<()> {
    let args = parse_scene_args(args)?;
    let settings = Settings::load();

    let mut scenes = SceneManager::with_builtin_scenes();
    let scene = resolve_scene(&mut scenes, &args)?;
    let mut meshes = ResourceManager::new(Box::new(ProceduralLoader), settings.bvh_max_leaf_size);
    let mut world = World::new();
    let report = scenes.load_scene(
        scene.as_deref().or(Some(settings.default_scene.as_str())),
        &mut world,
        &mut meshes,
    )?;

    let compiled = compile_scene(&world, &meshes);
    println!("Scene: {}", report.scene_id);
    println!("  instances: {}  lights: {}  meshes: {}", compiled.instance_count, compiled.light_count, compiled.mesh_count);
    if report.skipped > 0 {
        println!("  skipped entries: {}", report.skipped);
    }
    for name in &report.failed_meshes {
        println!("  failed mesh: {name}");
    }
    for name in meshes.names() {
        if let Some(mesh) = meshes.get(&name) {
            println!(
                "  mesh {:<12} {:>6} verts {:>6} tris {:>5} nodes {:>3} submeshes",
                name,
                mesh.vertices().len(),
                mesh.indices().len() / 3,
                mesh.node_count(),
                mesh.submeshes().len()
            );
        }
    }

    for (label, layout) in [
        ("scene", &compiled.scene_layout),
        ("geometry", &compiled.geometry_layout),
        ("accel", &compiled.accel_layout),
    ] {
        println!("{label} buffer: {} bytes", layout.total_bytes());
        for (section, range) in layout.iter() {
            println!("  {:<20} offset {:>8} len {:>8}", section.name(), range.offset, range.len);
        }
    }
    Ok(())
}

#[cfg(feature = "gpu")]
fn cmd_render(args: &[&str]) -> anyhow::Result<()> {
    use std::sync::Arc;

    use lightsim::engine::Engine;
    use lightsim::renderer::{GpuContext, OffscreenTarget};

    let args = parse_scene_args(args)?;
    let mut settings = Settings::load();
    if let Some(w) = args.width {
        settings.width = w;
    }
    if let Some(h) = args.height {
        settings.height = h;
    }
    settings.validate();
    let (width, height) = (settings.width, settings.height);
    let frames = args.frames.unwrap_or(16).max(1);
    let out = args.out.clone().unwrap_or_else(|| PathBuf::from("render.png"));

    let ctx = Arc::new(GpuContext::headless().context("creating GPU context")?);
    let target = OffscreenTarget::new(&ctx, width, height);
    let mut engine = Engine::new(ctx, target, settings);

    let scene = engine.with_scenes(|scenes| resolve_scene(scenes, &args))?;
    let report = engine.initialize(width, height, scene.as_deref())?;
    tracing::info!("rendering '{}' at {width}x{height}, {frames} frame(s)", report.scene_id);

    let dt = 1.0 / engine.settings().target_fps;
    let mut drawn = 0;
    for _ in 0..frames {
        if engine.step(dt) {
            drawn += 1;
        }
    }
    if drawn == 0 {
        bail!("no frame was rendered");
    }

    engine.with_target(|target, ctx| target.save_png(ctx, &out))?;
    println!("{} ({drawn} frames accumulated)", out.display());
    engine.dispose();
    Ok(())
}

#[cfg(not(feature = "gpu"))]
fn cmd_render(_args: &[&str]) -> anyhow::Result<()> {
    bail!("lightsim was built without the `gpu` feature")
}
