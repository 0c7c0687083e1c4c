//! Lighting pass: full-screen composition of the G-buffer with the directional light,
//! point lights, and both shadow maps into one color target.

use render_api::{DirectionalLight, PointLight};

use crate::error::{validated, RenderResult};
use crate::pass::{FrameData, PassContext, RenderPass};
use crate::resources::{uniform_buffer, uniform_entry, RenderTarget};

const LIGHTING_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/lighting.wgsl"));

/// Point lights the uniform block and the shadow cube array have room for.
pub const MAX_POINT_LIGHTS: usize = 8;

pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectionalLightBlock {
    pub direction: [f32; 3],
    pub _pad: f32,
    pub color: [f32; 4],
    pub light_space: [[f32; 4]; 4],
}

impl DirectionalLightBlock {
    pub fn new(light: &DirectionalLight, light_space: glam::Mat4) -> Self {
        Self {
            direction: light.direction.normalize_or_zero().to_array(),
            _pad: 0.0,
            color: light.color.extend(1.0).to_array(),
            light_space: light_space.to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AlignedPointLight {
    pub position: [f32; 3],
    pub _pad: f32,
    pub color: [f32; 3],
    pub radius: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightBlock {
    pub count: i32,
    pub _pad: [i32; 3],
    pub lights: [AlignedPointLight; MAX_POINT_LIGHTS],
}

impl PointLightBlock {
    /// `count` is the full number of lights submitted, even past the cap; only the first
    /// `MAX_POINT_LIGHTS` slots are written and the shader never reads further.
    pub fn from_lights(lights: &[PointLight]) -> Self {
        let mut block = Self {
            count: lights.len() as i32,
            _pad: [0; 3],
            lights: [AlignedPointLight::default(); MAX_POINT_LIGHTS],
        };
        for (slot, light) in block.lights.iter_mut().zip(lights) {
            *slot = AlignedPointLight {
                position: light.position.to_array(),
                _pad: 0.0,
                color: light.color.to_array(),
                radius: light.radius,
            };
        }
        block
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct ViewBlock {
    camera_position: [f32; 3],
    far_plane: f32,
}

const DIRECTIONAL_BLOCK_SIZE: u64 = std::mem::size_of::<DirectionalLightBlock>() as u64;
const POINT_BLOCK_SIZE: u64 = std::mem::size_of::<PointLightBlock>() as u64;
const VIEW_BLOCK_SIZE: u64 = std::mem::size_of::<ViewBlock>() as u64;

/// Images and values produced earlier in the frame, resolved by the caller for each execution.
pub struct LightingInputs<'a> {
    pub color: &'a wgpu::TextureView,
    pub normal: &'a wgpu::TextureView,
    pub position: &'a wgpu::TextureView,
    pub directional_shadow: &'a wgpu::TextureView,
    pub directional_light_space: glam::Mat4,
    pub point_shadows: &'a wgpu::TextureView,
    pub point_far_plane: f32,
}

pub struct LightingPass {
    pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    light_bind_group: wgpu::BindGroup,
    shadow_sampler: wgpu::Sampler,
    directional_buf: wgpu::Buffer,
    point_buf: wgpu::Buffer,
    view_buf: wgpu::Buffer,
    output: RenderTarget,
    warned_over_cap: bool,
}

impl LightingPass {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> RenderResult<Self> {
        let unfiltered = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lighting_texture_bind_group_layout"),
            entries: &[
                unfiltered(0),
                unfiltered(1),
                unfiltered(2),
                wgpu::BindGroupLayoutEntry { binding: 3, visibility: wgpu::ShaderStages::FRAGMENT, ty: wgpu::BindingType::Texture { sample_type: wgpu::TextureSampleType::Depth, view_dimension: wgpu::TextureViewDimension::D2, multisampled: false }, count: None },
                wgpu::BindGroupLayoutEntry { binding: 4, visibility: wgpu::ShaderStages::FRAGMENT, ty: wgpu::BindingType::Texture { sample_type: wgpu::TextureSampleType::Depth, view_dimension: wgpu::TextureViewDimension::CubeArray, multisampled: false }, count: None },
                wgpu::BindGroupLayoutEntry { binding: 5, visibility: wgpu::ShaderStages::FRAGMENT, ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison), count: None },
            ],
        });
        let light_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lighting_light_bind_group_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT, DIRECTIONAL_BLOCK_SIZE),
                uniform_entry(1, wgpu::ShaderStages::FRAGMENT, POINT_BLOCK_SIZE),
                uniform_entry(2, wgpu::ShaderStages::FRAGMENT, VIEW_BLOCK_SIZE),
            ],
        });
        let pipeline = validated(device, "lighting", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("lighting_shader"),
                source: wgpu::ShaderSource::Wgsl(LIGHTING_SHADER.into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("lighting_pipeline_layout"),
                bind_group_layouts: &[&texture_layout, &light_layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("lighting_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState { module: &shader, entry_point: Some("vs_fullscreen"), buffers: &[], compilation_options: Default::default() },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: OUTPUT_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lighting_shadow_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        let directional_buf = uniform_buffer(device, "lighting_directional", DIRECTIONAL_BLOCK_SIZE);
        let point_buf = uniform_buffer(device, "lighting_point_lights", POINT_BLOCK_SIZE);
        let view_buf = uniform_buffer(device, "lighting_view", VIEW_BLOCK_SIZE);
        let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lighting_light_bind_group"),
            layout: &light_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: directional_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: point_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: view_buf.as_entire_binding() },
            ],
        });
        let output = RenderTarget::new(device, "lighting_output", OUTPUT_FORMAT, width, height);
        Ok(Self {
            pipeline,
            texture_layout,
            light_bind_group,
            shadow_sampler,
            directional_buf,
            point_buf,
            view_buf,
            output,
            warned_over_cap: false,
        })
    }

    pub fn output(&self) -> &RenderTarget {
        &self.output
    }
}

impl RenderPass for LightingPass {
    type Inputs<'a> = LightingInputs<'a>;

    fn label(&self) -> &'static str {
        "lighting"
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if !self.output.matches(width, height) {
            self.output = RenderTarget::new(device, "lighting_output", OUTPUT_FORMAT, width, height);
        }
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>, frame: &FrameData<'_>, inputs: Self::Inputs<'_>) -> RenderResult<()> {
        let scene = &frame.scene;
        if scene.point_lights.len() > MAX_POINT_LIGHTS && !self.warned_over_cap {
            self.warned_over_cap = true;
            log::warn!(
                "{} point lights submitted; only the first {} are shaded",
                scene.point_lights.len(),
                MAX_POINT_LIGHTS
            );
        }
        let directional = DirectionalLightBlock::new(&scene.directional_light, inputs.directional_light_space);
        let points = PointLightBlock::from_lights(scene.point_lights);
        let view = ViewBlock {
            camera_position: scene.camera.position.to_array(),
            far_plane: inputs.point_far_plane,
        };
        ctx.queue.write_buffer(&self.directional_buf, 0, bytemuck::bytes_of(&directional));
        ctx.queue.write_buffer(&self.point_buf, 0, bytemuck::bytes_of(&points));
        ctx.queue.write_buffer(&self.view_buf, 0, bytemuck::bytes_of(&view));

        let texture_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lighting_texture_bind_group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(inputs.color) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(inputs.normal) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(inputs.position) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::TextureView(inputs.directional_shadow) },
                wgpu::BindGroupEntry { binding: 4, resource: wgpu::BindingResource::TextureView(inputs.point_shadows) },
                wgpu::BindGroupEntry { binding: 5, resource: wgpu::BindingResource::Sampler(&self.shadow_sampler) },
            ],
        });
        let mut rp = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lighting_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.output.view,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Clear(wgpu::Color::BLACK), store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_viewport(0.0, 0.0, self.output.width() as f32, self.output.height() as f32, 0.0, 1.0);
        rp.set_pipeline(&self.pipeline);
        rp.set_bind_group(0, &texture_bind_group, &[]);
        rp.set_bind_group(1, &self.light_bind_group, &[]);
        rp.draw(0..3, 0..1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn lights(n: usize) -> Vec<PointLight> {
        (0..n).map(|i| PointLight::new(Vec3::new(i as f32, 1.0, 0.0), Vec3::ONE)).collect()
    }

    #[test]
    fn block_layout_matches_wgsl() {
        assert_eq!(DIRECTIONAL_BLOCK_SIZE, 96);
        assert_eq!(std::mem::size_of::<AlignedPointLight>(), 32);
        assert_eq!(POINT_BLOCK_SIZE, 16 + 32 * MAX_POINT_LIGHTS as u64);
        assert_eq!(VIEW_BLOCK_SIZE, 16);
    }

    #[test]
    fn under_cap_fills_exactly_count_slots() {
        let block = PointLightBlock::from_lights(&lights(3));
        assert_eq!(block.count, 3);
        assert_eq!(block.lights[2].position, [2.0, 1.0, 0.0]);
        assert_eq!(block.lights[2].radius, 7.5);
        assert_eq!(block.lights[3], AlignedPointLight::default());
    }

    #[test]
    fn over_cap_keeps_true_count_but_writes_cap_slots() {
        // Compatibility behaviour: the count is not clamped, only the written slots are.
        let block = PointLightBlock::from_lights(&lights(10));
        assert_eq!(block.count, 10);
        assert_eq!(block.lights.len(), MAX_POINT_LIGHTS);
        assert_eq!(block.lights[MAX_POINT_LIGHTS - 1].position, [7.0, 1.0, 0.0]);
    }

    #[test]
    fn directional_block_normalizes_direction() {
        let light = DirectionalLight { direction: Vec3::new(0.0, -2.0, 0.0), color: Vec3::new(1.0, 0.5, 0.25) };
        let block = DirectionalLightBlock::new(&light, glam::Mat4::IDENTITY);
        assert_eq!(block.direction, [0.0, -1.0, 0.0]);
        assert_eq!(block.color, [1.0, 0.5, 0.25, 1.0]);
    }
}
