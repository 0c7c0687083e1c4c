//! Trait for render backends. The host drives frames through this without touching GPU types.

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::assets::AssetContainer;
use crate::camera::Camera;
use crate::frame::FrameContext;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("render error: {0}")]
    Render(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("no suitable GPU adapter")]
    NoAdapter,
    #[error("surface error: {0}")]
    Surface(String),
    #[error("window handle error: {0}")]
    WindowHandle(String),
}

/// Render backend the host talks to: hand over assets, size the viewport, draw frames.
pub trait RenderBackend: Send {
    /// Replace the whole asset set. Geometry and material bindings are rebuilt.
    fn set_assets(&mut self, assets: AssetContainer) -> Result<(), BackendError>;

    /// Resize every screen-sized target.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError>;

    /// Render one frame offscreen. Submits work internally.
    fn render_frame(&mut self, camera: &Camera, frame: &FrameContext) -> Result<(), BackendError>;
}

/// Extension for backends that can present to a window. Host passes raw handles (e.g. from winit);
/// the backend owns the surface and performs get_current_texture + present internally.
pub trait RenderBackendWindow: RenderBackend + Send {
    fn render_frame_to_window(
        &mut self,
        camera: &Camera,
        frame: &FrameContext,
        raw_window_handle: RawWindowHandle,
        raw_display_handle: RawDisplayHandle,
    ) -> Result<(), BackendError>;
}
