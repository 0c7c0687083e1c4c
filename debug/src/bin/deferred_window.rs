//! Interactive window: the demo scene through RenderBackendWindow, orbiting camera,
//! click to outline the object under the cursor.
//! Run: cargo run -p debug --bin deferred_window

use std::time::Instant;

use debug::{init_logging, DemoScene, LoggingConfig};
use glam::Vec3;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use render_api::{Camera, FrameContext, RenderBackend, RenderBackendWindow};
use umbra_bridge::UmbraWindowBackend;
use umbra_renderer::RendererConfig;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

struct App {
    window: Option<Window>,
    backend: Option<UmbraWindowBackend>,
    scene: DemoScene,
    pending_assets: Option<render_api::AssetContainer>,
    frame: FrameContext,
    camera: Camera,
    yaw: f32,
    size: (u32, u32),
    cursor: (f32, f32),
    selected: Option<usize>,
    started: Instant,
}

impl App {
    fn new() -> Self {
        let (assets, scene) = DemoScene::build(6);
        Self {
            window: None,
            backend: None,
            scene,
            pending_assets: Some(assets),
            frame: FrameContext::new(),
            camera: Camera::default(),
            yaw: 0.0,
            size: (1280, 720),
            cursor: (0.0, 0.0),
            selected: None,
            started: Instant::now(),
        }
    }

    fn update_camera(&mut self) {
        let eye = Vec3::new(self.yaw.sin() * 12.0, 6.0, self.yaw.cos() * 12.0);
        let mut camera = Camera::looking_at(eye, Vec3::new(0.0, 1.0, 0.0));
        camera.aspect = self.size.0 as f32 / self.size.1.max(1) as f32;
        camera.skybox = Some(self.scene.sky);
        self.camera = camera;
    }

    fn ensure_backend(&mut self) {
        if self.backend.is_some() {
            return;
        }
        let Some(window) = &self.window else { return };
        let config = RendererConfig { point_shadow_map_size: 1024, ..RendererConfig::default() };
        match UmbraWindowBackend::from_window(window, config, self.size.0, self.size.1) {
            Ok(mut backend) => {
                if let Some(assets) = self.pending_assets.take() {
                    if let Err(e) = backend.set_assets(assets) {
                        log::error!("set_assets failed: {}", e);
                        return;
                    }
                }
                self.backend = Some(backend);
            }
            Err(e) => log::error!("UmbraWindowBackend::from_window failed: {}", e),
        }
    }

    fn redraw(&mut self) {
        self.ensure_backend();
        self.update_camera();
        self.scene.animate(self.started.elapsed().as_secs_f32());
        let (Some(window), Some(backend)) = (&self.window, &mut self.backend) else { return };
        let (raw_window, raw_display) = match (window.window_handle(), window.display_handle()) {
            (Ok(wh), Ok(dh)) => (wh.as_raw(), dh.as_raw()),
            _ => return,
        };
        self.scene.submit(&mut self.frame, self.selected);
        if let Err(e) = backend.render_frame_to_window(&self.camera, &self.frame, raw_window, raw_display) {
            log::warn!("frame failed: {}", e);
        }
        self.frame.end_frame();
        window.request_redraw();
    }

    fn pick(&mut self) {
        let ray = self.camera.screen_ray(self.cursor.0, self.cursor.1, self.size.0, self.size.1);
        self.selected = self.scene.pick(&ray);
        log::info!("picked {:?}", self.selected);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title("Umbra deferred shading")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let phys = window.inner_size();
                self.size = (phys.width.max(1), phys.height.max(1));
                window.request_redraw();
                self.window = Some(window);
            }
            Err(e) => {
                log::error!("create_window failed: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(physical) => {
                self.size = (physical.width.max(1), physical.height.max(1));
                if let Some(backend) = &mut self.backend {
                    if let Err(e) = backend.resize(self.size.0, self.size.1) {
                        log::warn!("resize failed: {}", e);
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput { state: ElementState::Pressed, button: MouseButton::Left, .. } => self.pick(),
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => match event.physical_key {
                PhysicalKey::Code(KeyCode::ArrowLeft) => self.yaw -= 0.1,
                PhysicalKey::Code(KeyCode::ArrowRight) => self.yaw += 0.1,
                PhysicalKey::Code(KeyCode::Escape) => {
                    self.selected = None;
                }
                _ => {}
            },
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::default());
    let event_loop = winit::event_loop::EventLoop::new()?;
    let mut app = App::new();
    event_loop.run_app(&mut app)?;
    Ok(())
}
