//! Umbra plugin: implements RenderBackend for the host, rendering into an offscreen display target.

use render_api::{AssetContainer, BackendError, Camera, FrameContext, RenderBackend};
use umbra_renderer::resources::RenderTarget;
use umbra_renderer::{Renderer, RendererConfig};

/// Owns the renderer and an offscreen display target matching the viewport.
pub struct UmbraPlugin {
    renderer: Renderer,
    display: RenderTarget,
}

impl UmbraPlugin {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        config: RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, BackendError> {
        let format = config.display_format;
        let renderer = Renderer::new(device, queue, config, width, height)?;
        let display = RenderTarget::new(renderer.device(), "umbra_display", format, width, height);
        Ok(Self { renderer, display })
    }

    /// Picks the default adapter without a surface.
    pub fn headless(config: RendererConfig, width: u32, height: u32) -> Result<Self, BackendError> {
        let instance = wgpu::Instance::default();
        let (device, queue) = pollster::block_on(async {
            let adapter = request_adapter(&instance, None).await?;
            open_device(&adapter).await
        })?;
        Self::new(device, queue, config, width, height)
    }

    pub fn device(&self) -> &wgpu::Device {
        self.renderer.device()
    }

    pub fn queue(&self) -> &wgpu::Queue {
        self.renderer.queue()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Result of the last `render_frame`.
    pub fn display(&self) -> &RenderTarget {
        &self.display
    }

    /// Renders one frame into a caller-owned view (e.g. a swapchain image) instead of the offscreen target.
    pub fn render_frame_to_view(
        &mut self,
        camera: &Camera,
        frame: &FrameContext,
        view: &wgpu::TextureView,
    ) -> Result<(), BackendError> {
        Ok(self.renderer.render(camera, frame, view)?)
    }
}

impl RenderBackend for UmbraPlugin {
    fn set_assets(&mut self, assets: AssetContainer) -> Result<(), BackendError> {
        log::info!(
            "umbra: {} meshes, {} materials, {} textures",
            assets.meshes.len(),
            assets.materials.len(),
            assets.textures.len()
        );
        Ok(self.renderer.set_assets(assets)?)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        self.renderer.resize(width, height)?;
        if !self.display.matches(width, height) {
            let format = self.renderer.config().display_format;
            self.display = RenderTarget::new(self.renderer.device(), "umbra_display", format, width, height);
        }
        Ok(())
    }

    fn render_frame(&mut self, camera: &Camera, frame: &FrameContext) -> Result<(), BackendError> {
        Ok(self.renderer.render(camera, frame, &self.display.view)?)
    }
}

pub(crate) async fn request_adapter(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<wgpu::Adapter, BackendError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(BackendError::NoAdapter)?;
    log::info!("adapter: {:?}", adapter.get_info());
    Ok(adapter)
}

pub(crate) async fn open_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), BackendError> {
    adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await
        .map_err(|e| BackendError::Render(Box::new(e)))
}
