//! Highlight overlay: bounding-box outlines of highlighted draws, drawn over the lit image.

use crate::error::{validated, RenderResult};
use crate::light_pass::OUTPUT_FORMAT;
use crate::pass::{CameraBlock, FrameData, PassContext, RenderPass, CAMERA_BLOCK_SIZE};
use crate::resources::{uniform_buffer, uniform_entry, UniformArena};

const OVERLAY_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/overlay.wgsl"));

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ModelBlock {
    model: [[f32; 4]; 4],
}

const MODEL_BLOCK_SIZE: u64 = std::mem::size_of::<ModelBlock>() as u64;

pub struct HighlightPass {
    pipeline: wgpu::RenderPipeline,
    camera_bind_group: wgpu::BindGroup,
    camera_buf: wgpu::Buffer,
    model_layout: wgpu::BindGroupLayout,
    models: UniformArena,
}

impl HighlightPass {
    pub fn new(device: &wgpu::Device) -> RenderResult<Self> {
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("overlay_camera_bind_group_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX, CAMERA_BLOCK_SIZE)],
        });
        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("overlay_model_bind_group_layout"),
            entries: &[UniformArena::layout_entry(0, wgpu::ShaderStages::VERTEX, MODEL_BLOCK_SIZE)],
        });
        let pipeline = validated(device, "overlay", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("overlay_shader"),
                source: wgpu::ShaderSource::Wgsl(OVERLAY_SHADER.into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("overlay_pipeline_layout"),
                bind_group_layouts: &[&camera_layout, &model_layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("overlay_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: 12,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x3,
                        }],
                    }],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs"),
                    targets: &[Some(OUTPUT_FORMAT.into())],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::LineList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;
        let camera_buf = uniform_buffer(device, "overlay_camera", CAMERA_BLOCK_SIZE);
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("overlay_camera_bind_group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: camera_buf.as_entire_binding() }],
        });
        let models = UniformArena::new(device, "overlay_models", MODEL_BLOCK_SIZE);
        Ok(Self { pipeline, camera_bind_group, camera_buf, model_layout, models })
    }
}

impl RenderPass for HighlightPass {
    /// The lit image the outlines are drawn onto.
    type Inputs<'a> = &'a wgpu::TextureView;

    fn label(&self) -> &'static str {
        "overlay"
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>, frame: &FrameData<'_>, target: Self::Inputs<'_>) -> RenderResult<()> {
        if frame.highlights.is_empty() {
            return Ok(());
        }
        let camera = CameraBlock::from_scene(&frame.scene);
        ctx.queue.write_buffer(&self.camera_buf, 0, bytemuck::bytes_of(&camera));
        let blocks: Vec<ModelBlock> = frame
            .highlights
            .iter()
            .map(|h| ModelBlock { model: h.transform.to_cols_array_2d() })
            .collect();
        self.models.upload(ctx.device, ctx.queue, &blocks);
        let model_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("overlay_model_bind_group"),
            layout: &self.model_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: self.models.binding() }],
        });
        let mut rp = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("overlay_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        let (w, h) = ctx.viewport;
        rp.set_viewport(0.0, 0.0, w as f32, h as f32, 0.0, 1.0);
        rp.set_pipeline(&self.pipeline);
        rp.set_bind_group(0, &self.camera_bind_group, &[]);
        frame.geometry.bind_overlay(&mut rp);
        for (i, highlight) in frame.highlights.iter().enumerate() {
            rp.set_bind_group(1, &model_bind_group, &[self.models.offset(i)]);
            frame.geometry.draw_overlay(&mut rp, highlight.mesh)?;
        }
        Ok(())
    }
}
