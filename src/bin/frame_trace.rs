use anyhow::Result;
use kestrel_forward::cli::TraceArgs;
use kestrel_forward::headless::{RecordingTarget, SceneDescription};
use kestrel_forward::ForwardRenderer;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("error: {err:?}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = TraceArgs::parse_from_env()?;
    let config = args.pipeline_config()?;
    let scene = SceneDescription::load(&args.scene)?;
    let cameras = scene.cameras();
    if cameras.is_empty() {
        print_usage();
        return Ok(());
    }

    let mut renderer = ForwardRenderer::new(config)?;
    let mut culler = scene.culler(args.reversed_z);
    let mut target = RecordingTarget::new(args.reversed_z);
    let params = renderer.params();

    let mut rendered = 0u32;
    let mut skipped = 0u32;
    for camera in &cameras {
        println!("== camera '{}' ({:?})", camera.name, camera.camera_type);
        match renderer.render_camera(&mut target, &mut culler, camera) {
            Some(stats) => {
                rendered += 1;
                for command in target.take_commands() {
                    println!("  {}", command.describe(params));
                }
                let uniform = renderer.light_uniform();
                println!("  -- light uniform {} bytes", bytemuck::bytes_of(&uniform).len());
                println!(
                    "  -- lights {}/{} main {:?} shadow tiles {}/{} cascades {}",
                    stats.packed_lights,
                    stats.visible_lights,
                    stats.main_light,
                    stats.shadow_tiles_used,
                    stats.shadow_tile_count,
                    stats.cascades_rendered
                );
            }
            None => {
                skipped += 1;
                println!("  -- skipped (no culling parameters)");
            }
        }
    }
    println!("frame: {rendered} camera(s) rendered, {skipped} skipped, {} atlas(es) live", target.live_atlas_count());
    Ok(())
}

fn print_usage() {
    eprintln!(
        "Frame Trace

Usage:
  frame_trace <scene.json> [--config <pipeline.json>] [--reversed-z on|off]
              [--shadow-map-size 256|512|1024|2048|4096] [--cascades 0|2|4]

The scene needs at least one camera.
"
    );
}
