//! Umbra renderer: wgpu deferred shading with directional and point-light shadow maps.
//!
//! A frame runs a fixed chain of passes: directional shadow, point-light shadows, G-buffer,
//! lighting, skybox, highlight overlay and present. Cross-pass inputs are read from the producing
//! pass and handed to the consumer on every execution.

pub mod config;
pub mod error;
pub mod gbuffer;
pub mod geometry;
pub mod light_pass;
pub mod overlay;
pub mod pass;
pub mod present;
pub mod resources;
pub mod shadows;
pub mod skybox;

pub use config::{DirectionalShadowConfig, RendererConfig};
pub use error::{RenderError, RenderResult};
pub use gbuffer::{GBufferPass, GBufferTargets};
pub use geometry::{GeometryBuffer, MeshBufferInfo, PackedGeometry};
pub use light_pass::{LightingInputs, LightingPass, MAX_POINT_LIGHTS};
pub use overlay::HighlightPass;
pub use pass::{FrameData, PassContext, RenderPass};
pub use present::{PresentInputs, PresentPass};
pub use shadows::{DirectionalShadowPass, PointLightShadowPass};
pub use skybox::SkyboxPass;

use render_api::{AssetContainer, Camera, FrameContext};

use crate::pass::DrawUniforms;
use crate::resources::MaterialBindings;

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: RendererConfig,
    assets: Option<AssetContainer>,
    geometry: Option<GeometryBuffer>,
    materials: MaterialBindings,
    draw_uniforms: DrawUniforms,
    directional_shadow: DirectionalShadowPass,
    point_shadow: PointLightShadowPass,
    gbuffer: GBufferPass,
    lighting: LightingPass,
    skybox: SkyboxPass,
    overlay: HighlightPass,
    present: PresentPass,
    viewport: (u32, u32),
}

impl Renderer {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        config: RendererConfig,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        check_viewport(width, height)?;
        let materials = MaterialBindings::new(&device, &queue);
        let draw_uniforms = DrawUniforms::new(&device);
        let directional_shadow = DirectionalShadowPass::new(
            &device,
            draw_uniforms.layout(),
            config.shadow_map_size,
            config.directional_shadow,
        )?;
        let point_shadow = PointLightShadowPass::new(
            &device,
            draw_uniforms.layout(),
            config.point_shadow_map_size,
            config.point_shadow_far_plane,
        )?;
        let gbuffer = GBufferPass::new(&device, draw_uniforms.layout(), materials.layout(), width, height)?;
        let lighting = LightingPass::new(&device, width, height)?;
        let skybox = SkyboxPass::new(&device)?;
        let overlay = HighlightPass::new(&device)?;
        let present = PresentPass::new(&device, config.display_format, config.clear_color)?;
        log::info!(
            "renderer ready: {}x{}, display {:?}, shadow maps {} / {}",
            width,
            height,
            config.display_format,
            config.shadow_map_size,
            config.point_shadow_map_size
        );
        Ok(Self {
            device,
            queue,
            config,
            assets: None,
            geometry: None,
            materials,
            draw_uniforms,
            directional_shadow,
            point_shadow,
            gbuffer,
            lighting,
            skybox,
            overlay,
            present,
            viewport: (width, height),
        })
    }

    pub fn device(&self) -> &wgpu::Device { &self.device }
    pub fn queue(&self) -> &wgpu::Queue { &self.queue }
    pub fn config(&self) -> &RendererConfig { &self.config }
    pub fn viewport(&self) -> (u32, u32) { self.viewport }
    pub fn assets(&self) -> Option<&AssetContainer> { self.assets.as_ref() }

    /// Lit image of the last frame, before presentation.
    pub fn lit_view(&self) -> &wgpu::TextureView {
        &self.lighting.output().view
    }

    /// Replaces the asset set, rebuilding the shared geometry buffers, material bindings and
    /// skybox cubemaps. A rejected set leaves the previous one in place.
    pub fn set_assets(&mut self, assets: AssetContainer) -> RenderResult<()> {
        if let Some((id, _)) = assets.skyboxes.iter().find(|(_, sky)| !sky.is_complete()) {
            return Err(RenderError::InvalidSkybox(id));
        }
        self.materials.rebuild(&self.device, &self.queue, &assets)?;
        self.skybox.set_assets(&self.device, &self.queue, &assets)?;
        let packed = PackedGeometry::pack(assets.meshes.iter());
        self.geometry = Some(GeometryBuffer::new(&self.device, packed));
        self.assets = Some(assets);
        Ok(())
    }

    /// Resizes the passes that own screen-sized targets. Shadow maps keep their configured size.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        check_viewport(width, height)?;
        if self.viewport == (width, height) {
            return Ok(());
        }
        self.gbuffer.resize(&self.device, width, height);
        self.lighting.resize(&self.device, width, height);
        self.viewport = (width, height);
        log::debug!("viewport resized to {}x{}", width, height);
        Ok(())
    }

    /// Encodes and submits one frame into `target`, which must match the viewport size and
    /// the configured display format.
    pub fn render(&mut self, camera: &Camera, frame: &FrameContext, target: &wgpu::TextureView) -> RenderResult<()> {
        let (Some(assets), Some(geometry)) = (self.assets.as_ref(), self.geometry.as_ref()) else {
            return Err(RenderError::GeometryNotBuilt);
        };
        self.draw_uniforms.write(&self.device, &self.queue, frame.draws(), assets)?;
        log::debug!(
            "frame: {} draws, {} point lights, {} highlights",
            frame.draws().len(),
            frame.point_lights().len(),
            frame.highlights().len()
        );

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("umbra_frame") });
        let data = FrameData {
            draws: frame.draws(),
            highlights: frame.highlights(),
            scene: frame.scene(camera),
            geometry,
            materials: &self.materials,
            draw_uniforms: &self.draw_uniforms,
        };
        let mut ctx = PassContext {
            device: &self.device,
            queue: &self.queue,
            encoder: &mut encoder,
            viewport: self.viewport,
        };

        self.directional_shadow.execute(&mut ctx, &data, ())?;
        self.point_shadow.execute(&mut ctx, &data, ())?;
        self.gbuffer.execute(&mut ctx, &data, ())?;

        let targets = self.gbuffer.targets();
        let lighting_inputs = LightingInputs {
            color: &targets.color.view,
            normal: &targets.normal.view,
            position: &targets.position.view,
            directional_shadow: self.directional_shadow.shadow_map_view(),
            directional_light_space: self.directional_shadow.light_space(&data.scene.directional_light),
            point_shadows: self.point_shadow.cube_array_view(),
            point_far_plane: self.point_shadow.far_plane(),
        };
        self.lighting.execute(&mut ctx, &data, lighting_inputs)?;

        let lit = &self.lighting.output().view;
        self.skybox.execute(&mut ctx, &data, lit)?;
        self.overlay.execute(&mut ctx, &data, lit)?;
        self.present.execute(&mut ctx, &data, PresentInputs { source: lit, target })?;

        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}

fn check_viewport(width: u32, height: u32) -> RenderResult<()> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidViewport { width, height });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_viewport_is_rejected() {
        assert!(matches!(
            check_viewport(0, 720),
            Err(RenderError::InvalidViewport { width: 0, height: 720 })
        ));
        assert!(check_viewport(1, 1).is_ok());
    }

    fn gpu() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))?;
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default(), None)).ok()
    }

    fn small_config() -> RendererConfig {
        RendererConfig { shadow_map_size: 256, point_shadow_map_size: 64, ..Default::default() }
    }

    fn display_target(device: &wgpu::Device) -> wgpu::TextureView {
        resources::RenderTarget::new(device, "test_display", wgpu::TextureFormat::Rgba8Unorm, 64, 64).view
    }

    #[test]
    #[ignore = "needs a GPU adapter"]
    fn render_without_assets_fails() {
        let Some((device, queue)) = gpu() else { return };
        let mut renderer = Renderer::new(device, queue, small_config(), 64, 64).unwrap();
        let target = display_target(renderer.device());
        let err = renderer.render(&Camera::default(), &FrameContext::new(), &target).unwrap_err();
        assert!(matches!(err, RenderError::GeometryNotBuilt));
    }

    #[test]
    #[ignore = "needs a GPU adapter"]
    fn renders_a_lit_frame() {
        use glam::{Mat4, Vec3};
        use render_api::{CubemapData, DirectionalLight, DrawCommand, Material, Mesh, PointLight};

        let Some((device, queue)) = gpu() else { return };
        let mut renderer = Renderer::new(device, queue, small_config(), 64, 64).unwrap();
        let mut assets = AssetContainer::new();
        let cube = assets.add_mesh(Mesh::cube("cube"));
        let plane = assets.add_mesh(Mesh::plane("plane"));
        let material = assets.add_material(Material::flat([0.8, 0.2, 0.2]));
        let sky = assets.add_skybox(CubemapData::gradient("sky", 16, [40, 80, 200, 255], [200, 220, 255, 255], [30, 30, 30, 255]));
        renderer.set_assets(assets).unwrap();

        let mut frame = FrameContext::new();
        frame.set_directional_light(DirectionalLight { direction: Vec3::new(-0.3, -1.0, -0.2), color: Vec3::ONE });
        for i in 0..10 {
            frame.add_point_light(PointLight::new(Vec3::new(i as f32 - 5.0, 3.0, 0.0), Vec3::ONE));
        }
        frame.queue_draw_command(DrawCommand { mesh: plane, material, transform: Mat4::from_scale(Vec3::splat(10.0)) });
        let on_top = DrawCommand { mesh: cube, material, transform: Mat4::from_translation(Vec3::Y) };
        frame.queue_draw_command(on_top);
        frame.queue_highlight(on_top);

        let mut camera = Camera::looking_at(Vec3::new(4.0, 4.0, 6.0), Vec3::ZERO);
        camera.skybox = Some(sky);
        let target = display_target(renderer.device());
        renderer.render(&camera, &frame, &target).unwrap();
        renderer.resize(32, 48).unwrap();
        let target = resources::RenderTarget::new(renderer.device(), "test_display", wgpu::TextureFormat::Rgba8Unorm, 32, 48).view;
        renderer.render(&camera, &frame, &target).unwrap();
    }

    #[test]
    #[ignore = "needs a GPU adapter"]
    fn broken_skybox_keeps_previous_assets() {
        use render_api::{CubemapData, Mesh};

        let Some((device, queue)) = gpu() else { return };
        let mut renderer = Renderer::new(device, queue, small_config(), 64, 64).unwrap();
        let mut good = AssetContainer::new();
        good.add_mesh(Mesh::cube("cube"));
        renderer.set_assets(good).unwrap();

        let mut bad = AssetContainer::new();
        bad.add_mesh(Mesh::plane("plane"));
        let mut sky = CubemapData::gradient("sky", 4, [0; 4], [0; 4], [0; 4]);
        sky.faces[0].clear();
        let sky = bad.add_skybox(sky);
        assert!(matches!(renderer.set_assets(bad), Err(RenderError::InvalidSkybox(id)) if id == sky));
        assert!(renderer.assets().and_then(|a| a.find_mesh("cube")).is_some());
    }
}
