//! Renderer error type.

use render_api::{BackendError, MaterialId, MeshId, SkyboxId, TextureId};

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("shader or pipeline `{label}` failed validation: {diagnostic}")]
    ShaderCompilation { label: String, diagnostic: String },
    #[error("mesh {0:?} is not in the geometry buffer")]
    MeshNotFound(MeshId),
    #[error("material {0:?} is not in the asset set")]
    MaterialNotFound(MaterialId),
    #[error("texture {0:?} is not in the asset set")]
    TextureNotFound(TextureId),
    #[error("texture {0:?} is empty or its pixel data does not match its size")]
    InvalidTexture(TextureId),
    #[error("skybox {0:?} is not in the asset set")]
    SkyboxNotFound(SkyboxId),
    #[error("skybox {0:?} has a face whose pixel data does not match its size")]
    InvalidSkybox(SkyboxId),
    #[error("no assets set; call set_assets before rendering")]
    GeometryNotBuilt,
    #[error("invalid viewport {width}x{height}")]
    InvalidViewport { width: u32, height: u32 },
}

impl From<RenderError> for BackendError {
    fn from(e: RenderError) -> Self {
        BackendError::Render(Box::new(e))
    }
}

/// Runs `build` inside a validation error scope so shader and pipeline failures surface
/// as `ShaderCompilation` instead of an uncaptured-error panic.
pub(crate) fn validated<T>(device: &wgpu::Device, label: &str, build: impl FnOnce() -> T) -> RenderResult<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(RenderError::ShaderCompilation { label: label.to_string(), diagnostic: err.to_string() }),
        None => Ok(value),
    }
}
