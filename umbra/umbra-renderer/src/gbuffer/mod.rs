//! GBuffer pass: color, world normal and world position targets plus depth, from the camera.

use render_api::Vertex;

use crate::error::{validated, RenderResult};
use crate::pass::{CameraBlock, FrameData, PassContext, RenderPass, CAMERA_BLOCK_SIZE};
use crate::resources::{uniform_buffer, uniform_entry, RenderTarget};

const GBUFFER_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/gbuffer.wgsl"));

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Half floats: 32-bit float color targets are not renderable on GL adapters.
pub const POSITION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Targets the lighting pass reads.
pub struct GBufferTargets {
    pub color: RenderTarget,
    pub normal: RenderTarget,
    pub position: RenderTarget,
    pub depth: RenderTarget,
}

impl GBufferTargets {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self {
            color: RenderTarget::new(device, "gbuffer_color", COLOR_FORMAT, width, height),
            normal: RenderTarget::new(device, "gbuffer_normal", NORMAL_FORMAT, width, height),
            position: RenderTarget::new(device, "gbuffer_position", POSITION_FORMAT, width, height),
            depth: RenderTarget::new(device, "gbuffer_depth", DEPTH_FORMAT, width, height),
        }
    }
}

pub struct GBufferPass {
    pipeline: wgpu::RenderPipeline,
    camera_bind_group: wgpu::BindGroup,
    camera_buf: wgpu::Buffer,
    targets: GBufferTargets,
}

impl GBufferPass {
    pub fn new(
        device: &wgpu::Device,
        draw_layout: &wgpu::BindGroupLayout,
        material_layout: &wgpu::BindGroupLayout,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gbuffer_camera_bind_group_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX, CAMERA_BLOCK_SIZE)],
        });
        let pipeline = validated(device, "gbuffer", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("gbuffer_shader"),
                source: wgpu::ShaderSource::Wgsl(GBUFFER_SHADER.into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("gbuffer_pipeline_layout"),
                bind_group_layouts: &[&camera_layout, draw_layout, material_layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("gbuffer_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: Vertex::STRIDE,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[
                            wgpu::VertexAttribute {
                                offset: 0,
                                shader_location: 0,
                                format: wgpu::VertexFormat::Float32x3,
                            },
                            wgpu::VertexAttribute {
                                offset: 12,
                                shader_location: 1,
                                format: wgpu::VertexFormat::Float32x3,
                            },
                            wgpu::VertexAttribute {
                                offset: 24,
                                shader_location: 2,
                                format: wgpu::VertexFormat::Float32x2,
                            },
                        ],
                    }],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs"),
                    targets: &[
                        Some(COLOR_FORMAT.into()),
                        Some(NORMAL_FORMAT.into()),
                        Some(POSITION_FORMAT.into()),
                    ],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;
        let camera_buf = uniform_buffer(device, "gbuffer_camera", CAMERA_BLOCK_SIZE);
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gbuffer_camera_bind_group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: camera_buf.as_entire_binding() }],
        });
        let targets = GBufferTargets::new(device, width, height);
        Ok(Self { pipeline, camera_bind_group, camera_buf, targets })
    }

    pub fn targets(&self) -> &GBufferTargets {
        &self.targets
    }
}

impl RenderPass for GBufferPass {
    type Inputs<'a> = ();

    fn label(&self) -> &'static str {
        "gbuffer"
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if !self.targets.color.matches(width, height) {
            self.targets = GBufferTargets::new(device, width, height);
        }
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>, frame: &FrameData<'_>, _inputs: Self::Inputs<'_>) -> RenderResult<()> {
        let camera = CameraBlock::from_scene(&frame.scene);
        ctx.queue.write_buffer(&self.camera_buf, 0, bytemuck::bytes_of(&camera));
        let mut rp = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("gbuffer_pass"),
            color_attachments: &[
                cleared(&self.targets.color.view),
                cleared(&self.targets.normal.view),
                cleared(&self.targets.position.view),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_pipeline(&self.pipeline);
        let w = self.targets.color.width() as f32;
        let h = self.targets.color.height() as f32;
        rp.set_viewport(0.0, 0.0, w, h, 0.0, 1.0);
        rp.set_bind_group(0, &self.camera_bind_group, &[]);
        frame.geometry.bind(&mut rp);
        for (i, draw) in frame.draws.iter().enumerate() {
            rp.set_bind_group(1, frame.draw_uniforms.bind_group(), &[frame.draw_uniforms.offset(i)]);
            rp.set_bind_group(2, frame.materials.group(draw.material)?, &[]);
            frame.geometry.draw(&mut rp, draw.mesh)?;
        }
        Ok(())
    }
}

fn cleared(view: &wgpu::TextureView) -> Option<wgpu::RenderPassColorAttachment<'_>> {
    Some(wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            store: wgpu::StoreOp::Store,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_targets_render_without_extra_features() {
        for format in [COLOR_FORMAT, NORMAL_FORMAT, POSITION_FORMAT] {
            let features = format.guaranteed_format_features(wgpu::Features::empty());
            assert!(features.allowed_usages.contains(wgpu::TextureUsages::RENDER_ATTACHMENT), "{format:?}");
            assert!(features.allowed_usages.contains(wgpu::TextureUsages::TEXTURE_BINDING), "{format:?}");
            // Four channels of at most 16 bits each.
            assert!(format.block_copy_size(None).is_some_and(|size| size <= 8), "{format:?}");
        }
    }
}
