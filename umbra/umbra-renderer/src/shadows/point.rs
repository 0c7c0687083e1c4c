//! Point-light shadow pass: linear distance to each light, rendered into a cube-map-array
//! depth target. Layer `6 * light + face` holds one face; lights past the cap cast no shadow.

use crate::error::{validated, RenderResult};
use crate::light_pass::MAX_POINT_LIGHTS;
use crate::pass::{FrameData, PassContext, RenderPass};
use crate::resources::{RenderTarget, UniformArena};
use crate::shadows::transforms::{cube_layer, point_light_face_transforms, CUBE_FACES};
use crate::shadows::{depth_only_pipeline, SHADOW_FORMAT};

const POINT_SHADOW_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/shadow_point.wgsl"));

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct FaceBlock {
    light_space: [[f32; 4]; 4],
    light_position: [f32; 3],
    far_plane: f32,
}

const FACE_BLOCK_SIZE: u64 = std::mem::size_of::<FaceBlock>() as u64;

pub struct PointLightShadowPass {
    pipeline: wgpu::RenderPipeline,
    face_layout: wgpu::BindGroupLayout,
    faces: UniformArena,
    depth: RenderTarget,
    cube_view: wgpu::TextureView,
    layer_views: Vec<wgpu::TextureView>,
    far_plane: f32,
}

impl PointLightShadowPass {
    pub fn new(
        device: &wgpu::Device,
        draw_layout: &wgpu::BindGroupLayout,
        resolution: u32,
        far_plane: f32,
    ) -> RenderResult<Self> {
        let face_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("point_shadow_bind_group_layout"),
            entries: &[UniformArena::layout_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                FACE_BLOCK_SIZE,
            )],
        });
        let pipeline = validated(device, "point_shadow", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("point_shadow_shader"),
                source: wgpu::ShaderSource::Wgsl(POINT_SHADOW_SHADER.into()),
            });
            depth_only_pipeline(device, "point_shadow", &shader, &[&face_layout, draw_layout], true)
        })?;
        let layers = (CUBE_FACES * MAX_POINT_LIGHTS) as u32;
        let depth = RenderTarget::with_layers(device, "point_shadow_cube_array", SHADOW_FORMAT, resolution, resolution, layers);
        let cube_view = depth.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("point_shadow_cube_array_view"),
            dimension: Some(wgpu::TextureViewDimension::CubeArray),
            array_layer_count: Some(layers),
            ..Default::default()
        });
        let layer_views = (0..layers).map(|layer| depth.layer_view(layer)).collect();
        let faces = UniformArena::new(device, "point_shadow_faces", FACE_BLOCK_SIZE);
        log::debug!("point shadow pass: {} layers of {}x{}", layers, resolution, resolution);
        Ok(Self { pipeline, face_layout, faces, depth, cube_view, layer_views, far_plane })
    }

    /// Cube-array view over all lights, for sampling in the lighting pass.
    pub fn cube_array_view(&self) -> &wgpu::TextureView {
        &self.cube_view
    }

    pub fn far_plane(&self) -> f32 {
        self.far_plane
    }
}

impl RenderPass for PointLightShadowPass {
    type Inputs<'a> = ();

    fn label(&self) -> &'static str {
        "point_shadow"
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>, frame: &FrameData<'_>, _inputs: Self::Inputs<'_>) -> RenderResult<()> {
        let lights = &frame.scene.point_lights[..frame.scene.point_lights.len().min(MAX_POINT_LIGHTS)];
        let blocks: Vec<FaceBlock> = lights
            .iter()
            .flat_map(|light| {
                point_light_face_transforms(light.position, self.far_plane).map(|m| FaceBlock {
                    light_space: m.to_cols_array_2d(),
                    light_position: light.position.to_array(),
                    far_plane: self.far_plane,
                })
            })
            .collect();
        self.faces.upload(ctx.device, ctx.queue, &blocks);
        let face_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("point_shadow_bind_group"),
            layout: &self.face_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: self.faces.binding() }],
        });
        let size = self.depth.width() as f32;
        for light_index in 0..lights.len() {
            for face in 0..CUBE_FACES {
                let layer = cube_layer(light_index, face);
                let mut rp = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("point_shadow_pass"),
                    color_attachments: &[],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.layer_views[layer as usize],
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                rp.set_viewport(0.0, 0.0, size, size, 0.0, 1.0);
                rp.set_pipeline(&self.pipeline);
                rp.set_bind_group(0, &face_bind_group, &[self.faces.offset(layer as usize)]);
                frame.geometry.bind(&mut rp);
                for (i, draw) in frame.draws.iter().enumerate() {
                    rp.set_bind_group(1, frame.draw_uniforms.bind_group(), &[frame.draw_uniforms.offset(i)]);
                    frame.geometry.draw(&mut rp, draw.mesh)?;
                }
            }
        }
        Ok(())
    }
}
