//! Window-capable backend: created from a window, implements RenderBackendWindow.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use render_api::{AssetContainer, BackendError, Camera, FrameContext, RenderBackend, RenderBackendWindow};
use umbra_renderer::RendererConfig;
use wgpu::SurfaceTargetUnsafe;

use crate::plugin::{open_device, request_adapter, UmbraPlugin};

/// Backend that owns the wgpu Instance and an UmbraPlugin; can present to a window.
/// The surface is recreated each frame from the raw handles the host passes in, so the
/// window's lifetime stays with the host.
pub struct UmbraWindowBackend {
    instance: wgpu::Instance,
    plugin: UmbraPlugin,
    surface_format: wgpu::TextureFormat,
}

impl UmbraWindowBackend {
    /// The window is only used for its raw handles and an initial surface for adapter selection.
    /// `config.display_format` is replaced by the sRGB variant of the surface's preferred format.
    pub fn from_window(
        window: &(impl HasWindowHandle + HasDisplayHandle),
        config: RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, BackendError> {
        let raw_window = window.window_handle().map_err(|e| BackendError::WindowHandle(e.to_string()))?.as_raw();
        let raw_display = window.display_handle().map_err(|e| BackendError::WindowHandle(e.to_string()))?.as_raw();
        pollster::block_on(Self::from_raw_handles(raw_window, raw_display, config, width, height))
    }

    async fn from_raw_handles(
        raw_window_handle: RawWindowHandle,
        raw_display_handle: RawDisplayHandle,
        config: RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, BackendError> {
        let instance = wgpu::Instance::default();
        let surface = create_surface(&instance, raw_window_handle, raw_display_handle)?;
        let adapter = request_adapter(&instance, Some(&surface)).await?;
        let surface_format = surface
            .get_capabilities(&adapter)
            .formats
            .first()
            .copied()
            .ok_or_else(|| BackendError::Surface("surface reports no formats for this adapter".to_string()))?;
        let (device, queue) = open_device(&adapter).await?;
        drop(surface);
        let config = RendererConfig { display_format: surface_format.add_srgb_suffix(), ..config };
        log::info!("window backend: surface format {:?}, display {:?}", surface_format, config.display_format);
        let plugin = UmbraPlugin::new(device, queue, config, width, height)?;
        Ok(Self { instance, plugin, surface_format })
    }

    pub fn plugin(&self) -> &UmbraPlugin {
        &self.plugin
    }

    fn surface_config(&self) -> wgpu::SurfaceConfiguration {
        let (width, height) = self.plugin.renderer().viewport();
        wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: self.surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![self.surface_format.add_srgb_suffix()],
            desired_maximum_frame_latency: 2,
        }
    }
}

fn create_surface(
    instance: &wgpu::Instance,
    raw_window_handle: RawWindowHandle,
    raw_display_handle: RawDisplayHandle,
) -> Result<wgpu::Surface<'static>, BackendError> {
    let target = SurfaceTargetUnsafe::RawHandle { raw_window_handle, raw_display_handle };
    // SAFETY: the host keeps the window alive for as long as the surface is used, which is
    // at most one frame.
    unsafe { instance.create_surface_unsafe(target) }.map_err(|e| BackendError::Surface(e.to_string()))
}

impl RenderBackend for UmbraWindowBackend {
    fn set_assets(&mut self, assets: AssetContainer) -> Result<(), BackendError> {
        self.plugin.set_assets(assets)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        self.plugin.resize(width, height)
    }

    fn render_frame(&mut self, camera: &Camera, frame: &FrameContext) -> Result<(), BackendError> {
        self.plugin.render_frame(camera, frame)
    }
}

impl RenderBackendWindow for UmbraWindowBackend {
    fn render_frame_to_window(
        &mut self,
        camera: &Camera,
        frame: &FrameContext,
        raw_window_handle: RawWindowHandle,
        raw_display_handle: RawDisplayHandle,
    ) -> Result<(), BackendError> {
        let surface = create_surface(&self.instance, raw_window_handle, raw_display_handle)?;
        let config = self.surface_config();
        surface.configure(self.plugin.device(), &config);

        let texture = match surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                log::warn!("surface outdated or lost; reconfiguring");
                surface.configure(self.plugin.device(), &config);
                surface.get_current_texture().map_err(|e| BackendError::Surface(e.to_string()))?
            }
            Err(e) => return Err(BackendError::Surface(e.to_string())),
        };
        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(self.surface_format.add_srgb_suffix()),
            ..Default::default()
        });
        self.plugin.render_frame_to_view(camera, frame, &view)?;
        texture.present();
        Ok(())
    }
}
