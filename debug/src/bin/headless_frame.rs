//! Offscreen frames through the RenderBackend trait: no window, no surface.
//! Run: cargo run -p debug --bin headless_frame

use debug::{init_logging, DemoScene, LoggingConfig};
use glam::Vec3;
use render_api::{Camera, FrameContext, RenderBackend};
use umbra_bridge::UmbraPlugin;
use umbra_renderer::RendererConfig;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::default());

    let config = RendererConfig { point_shadow_map_size: 1024, ..RendererConfig::default() };
    let mut backend: Box<dyn RenderBackend> = Box::new(UmbraPlugin::headless(config, WIDTH, HEIGHT)?);

    // Ten lights: two past the shading cap.
    let (assets, mut scene) = DemoScene::build(10);
    backend.set_assets(assets)?;

    let mut camera = Camera::looking_at(Vec3::new(0.0, 6.0, 12.0), Vec3::ZERO);
    camera.aspect = WIDTH as f32 / HEIGHT as f32;
    camera.skybox = Some(scene.sky);
    let selected = scene.pick(&camera.screen_ray(WIDTH as f32 * 0.5, HEIGHT as f32 * 0.5, WIDTH, HEIGHT));
    log::info!("center pick: {:?}", selected);

    let mut frame = FrameContext::new();
    for i in 0..4 {
        scene.animate(i as f32 * 0.25);
        scene.submit(&mut frame, selected);
        backend.render_frame(&camera, &frame)?;
        frame.end_frame();
    }

    // Same aspect, so the camera stays as is.
    backend.resize(WIDTH / 2, HEIGHT / 2)?;
    scene.submit(&mut frame, None);
    backend.render_frame(&camera, &frame)?;
    frame.end_frame();

    log::info!("headless_frame: 5 frames OK");
    Ok(())
}
