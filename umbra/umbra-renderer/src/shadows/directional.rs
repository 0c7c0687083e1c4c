//! Directional shadow pass: depth of the whole draw queue from the directional light into one 2D map.

use render_api::DirectionalLight;

use crate::config::DirectionalShadowConfig;
use crate::error::{validated, RenderResult};
use crate::pass::{FrameData, PassContext, RenderPass};
use crate::resources::{uniform_buffer, uniform_entry, RenderTarget};
use crate::shadows::transforms::directional_light_space;
use crate::shadows::{depth_only_pipeline, SHADOW_FORMAT};

const SHADOW_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/shadow_directional.wgsl"));

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct LightSpaceBlock {
    light_space: [[f32; 4]; 4],
}

pub struct DirectionalShadowPass {
    pipeline: wgpu::RenderPipeline,
    light_bind_group: wgpu::BindGroup,
    light_buf: wgpu::Buffer,
    shadow_map: RenderTarget,
    config: DirectionalShadowConfig,
}

impl DirectionalShadowPass {
    pub fn new(
        device: &wgpu::Device,
        draw_layout: &wgpu::BindGroupLayout,
        resolution: u32,
        config: DirectionalShadowConfig,
    ) -> RenderResult<Self> {
        let light_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("directional_shadow_bind_group_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX, 64)],
        });
        let pipeline = validated(device, "directional_shadow", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("directional_shadow_shader"),
                source: wgpu::ShaderSource::Wgsl(SHADOW_SHADER.into()),
            });
            depth_only_pipeline(device, "directional_shadow", &shader, &[&light_layout, draw_layout], false)
        })?;
        let light_buf = uniform_buffer(device, "directional_shadow_light_space", 64);
        let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("directional_shadow_bind_group"),
            layout: &light_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: light_buf.as_entire_binding() }],
        });
        let shadow_map = RenderTarget::new(device, "directional_shadow_map", SHADOW_FORMAT, resolution, resolution);
        log::debug!("directional shadow pass: {}x{} map", resolution, resolution);
        Ok(Self { pipeline, light_bind_group, light_buf, shadow_map, config })
    }

    pub fn shadow_map_view(&self) -> &wgpu::TextureView {
        &self.shadow_map.view
    }

    pub fn light_space(&self, light: &DirectionalLight) -> glam::Mat4 {
        directional_light_space(light, &self.config)
    }
}

impl RenderPass for DirectionalShadowPass {
    type Inputs<'a> = ();

    fn label(&self) -> &'static str {
        "directional_shadow"
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>, frame: &FrameData<'_>, _inputs: Self::Inputs<'_>) -> RenderResult<()> {
        let block = LightSpaceBlock {
            light_space: self.light_space(&frame.scene.directional_light).to_cols_array_2d(),
        };
        ctx.queue.write_buffer(&self.light_buf, 0, bytemuck::bytes_of(&block));
        let mut rp = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("directional_shadow_pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.shadow_map.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        let size = self.shadow_map.width() as f32;
        rp.set_viewport(0.0, 0.0, size, size, 0.0, 1.0);
        rp.set_pipeline(&self.pipeline);
        rp.set_bind_group(0, &self.light_bind_group, &[]);
        frame.geometry.bind(&mut rp);
        for (i, draw) in frame.draws.iter().enumerate() {
            rp.set_bind_group(1, frame.draw_uniforms.bind_group(), &[frame.draw_uniforms.offset(i)]);
            frame.geometry.draw(&mut rp, draw.mesh)?;
        }
        Ok(())
    }
}
