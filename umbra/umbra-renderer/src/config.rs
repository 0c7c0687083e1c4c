//! Renderer configuration: shadow resolution and frusta, presentation format.

/// Orthographic frustum for the directional shadow map. The light is placed at
/// `-direction * distance`, looking at the world origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalShadowConfig {
    pub distance: f32,
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for DirectionalShadowConfig {
    fn default() -> Self {
        Self { distance: 50.0, half_extent: 50.0, near: 1.0, far: 200.0 }
    }
}

#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Edge length of the directional shadow map.
    pub shadow_map_size: u32,
    /// Edge length of each point-light cube face. The cube array holds six faces per light slot.
    pub point_shadow_map_size: u32,
    pub directional_shadow: DirectionalShadowConfig,
    /// Far plane of the cube-face projections; point shadow depth is stored as distance / far.
    pub point_shadow_far_plane: f32,
    /// Format of the presentation target (e.g. Rgba8Unorm offscreen, the surface format in a window).
    pub display_format: wgpu::TextureFormat,
    pub clear_color: wgpu::Color,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            shadow_map_size: 2048,
            point_shadow_map_size: 2048,
            directional_shadow: DirectionalShadowConfig::default(),
            point_shadow_far_plane: 50.0,
            display_format: wgpu::TextureFormat::Rgba8Unorm,
            clear_color: wgpu::Color::BLACK,
        }
    }
}
