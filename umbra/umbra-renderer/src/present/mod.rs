//! Present pass: copies the lit image onto the display target, filling empty pixels with the clear color.

use crate::error::{validated, RenderResult};
use crate::pass::{FrameData, PassContext, RenderPass};
use crate::resources::{uniform_buffer, uniform_entry};

const PRESENT_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/present.wgsl"));

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct BackgroundBlock {
    clear_color: [f32; 4],
}

pub struct PresentInputs<'a> {
    /// Lit image, same size as the viewport.
    pub source: &'a wgpu::TextureView,
    /// Display target, in the configured display format.
    pub target: &'a wgpu::TextureView,
}

pub struct PresentPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    background_buf: wgpu::Buffer,
    clear_color: wgpu::Color,
}

impl PresentPass {
    pub fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat, clear_color: wgpu::Color) -> RenderResult<Self> {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("present_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                uniform_entry(1, wgpu::ShaderStages::FRAGMENT, 16),
            ],
        });
        let pipeline = validated(device, "present", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("present_shader"),
                source: wgpu::ShaderSource::Wgsl(PRESENT_SHADER.into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("present_pipeline_layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("present_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: output_format,
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
        let background_buf = uniform_buffer(device, "present_background", 16);
        Ok(Self { pipeline, bind_group_layout, background_buf, clear_color })
    }
}

impl RenderPass for PresentPass {
    type Inputs<'a> = PresentInputs<'a>;

    fn label(&self) -> &'static str {
        "present"
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>, _frame: &FrameData<'_>, inputs: Self::Inputs<'_>) -> RenderResult<()> {
        let c = self.clear_color;
        let block = BackgroundBlock { clear_color: [c.r as f32, c.g as f32, c.b as f32, c.a as f32] };
        ctx.queue.write_buffer(&self.background_buf, 0, bytemuck::bytes_of(&block));
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("present_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(inputs.source) },
                wgpu::BindGroupEntry { binding: 1, resource: self.background_buf.as_entire_binding() },
            ],
        });
        let mut rp = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("present_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: inputs.target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        let (w, h) = ctx.viewport;
        rp.set_viewport(0.0, 0.0, w as f32, h as f32, 0.0, 1.0);
        rp.set_pipeline(&self.pipeline);
        rp.set_bind_group(0, &bind_group, &[]);
        rp.draw(0..3, 0..1);
        Ok(())
    }
}
