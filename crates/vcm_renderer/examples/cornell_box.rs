//! Render the Cornell box with one of the bidirectional renderers.
//!
//! Usage: `cargo run --release --example cornell_box -- [settings.json] [frames]`
//!
//! Without a settings file the default VCM settings at 256x256 are used.
//! Set `RUST_LOG=info` to follow the frames.

use vcm_core::presets::cornell_box;
use vcm_renderer::{FrameController, RenderSettings};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => RenderSettings::from_json(&std::fs::read_to_string(path)?)?,
        None => RenderSettings::default(),
    };
    let frames: usize = match args.next() {
        Some(frames) => frames.parse()?,
        None => 16,
    };

    println!("{}", settings.to_json()?);

    let start = std::time::Instant::now();
    let (scene, camera) = cornell_box(settings.width, settings.height)?;
    println!("Scene built in {:?}", start.elapsed());

    let mut controller = FrameController::new(settings, &scene, &camera)?;
    println!("Rendering {} frames with {}...", frames, controller.renderer_name());

    let start = std::time::Instant::now();
    controller.render(frames);
    println!("Rendered in {:?}", start.elapsed());

    let fb = controller.framebuffer();
    let filename = format!("cornell_box_{}.png", controller.renderer_name());
    image::save_buffer(
        &filename,
        &fb.to_rgba(0),
        fb.width(),
        fb.height(),
        image::ColorType::Rgba8,
    )?;
    println!("Saved to {}", filename);

    Ok(())
}
