//! Skybox pass: composites the camera's cubemap behind the lit image.
//!
//! Runs after lighting on the same target. Blending keeps lit pixels (alpha 1) and
//! fills background pixels (alpha 0) with the sky, leaving alpha at 1 everywhere it drew.

use std::collections::HashMap;

use glam::{Mat3, Mat4};
use render_api::{AssetContainer, Camera, CubemapData, SkyboxId};
use wgpu::util::DeviceExt;

use crate::error::{validated, RenderError, RenderResult};
use crate::light_pass::OUTPUT_FORMAT;
use crate::pass::{FrameData, PassContext, RenderPass};
use crate::resources::{uniform_buffer, uniform_entry};

const SKYBOX_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/skybox.wgsl"));

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkyBlock {
    pub inverse_view_projection: [[f32; 4]; 4],
}

const SKY_BLOCK_SIZE: u64 = std::mem::size_of::<SkyBlock>() as u64;

/// Maps clip space back to world directions as seen from the camera, ignoring its position.
pub fn sky_inverse_view_projection(camera: &Camera) -> Mat4 {
    let rotation = Mat4::from_mat3(Mat3::from_mat4(camera.view()));
    (camera.projection() * rotation).inverse()
}

/// Destination-alpha composite: `src * (1 - dst.a) + dst * dst.a`, alpha forced to 1.
const UNDER_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::OneMinusDstAlpha,
        dst_factor: wgpu::BlendFactor::DstAlpha,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::Zero,
        operation: wgpu::BlendOperation::Add,
    },
};

pub struct SkyboxPass {
    pipeline: wgpu::RenderPipeline,
    sky_bind_group: wgpu::BindGroup,
    sky_buf: wgpu::Buffer,
    cubemap_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    cubemaps: HashMap<SkyboxId, wgpu::BindGroup>,
}

impl SkyboxPass {
    pub fn new(device: &wgpu::Device) -> RenderResult<Self> {
        let sky_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("skybox_sky_bind_group_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT, SKY_BLOCK_SIZE)],
        });
        let cubemap_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("skybox_cubemap_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline = validated(device, "skybox", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("skybox_shader"),
                source: wgpu::ShaderSource::Wgsl(SKYBOX_SHADER.into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("skybox_pipeline_layout"),
                bind_group_layouts: &[&sky_layout, &cubemap_layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("skybox_pipeline"),
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
                        format: OUTPUT_FORMAT,
                        blend: Some(UNDER_BLEND),
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
        let sky_buf = uniform_buffer(device, "skybox_sky", SKY_BLOCK_SIZE);
        let sky_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("skybox_sky_bind_group"),
            layout: &sky_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: sky_buf.as_entire_binding() }],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("skybox_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Ok(Self { pipeline, sky_bind_group, sky_buf, cubemap_layout, sampler, cubemaps: HashMap::new() })
    }

    /// Uploads every skybox in the asset set. On error the previous cubemaps are kept.
    pub fn set_assets(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, assets: &AssetContainer) -> RenderResult<()> {
        let mut cubemaps = HashMap::new();
        for (id, data) in &assets.skyboxes {
            if !data.is_complete() {
                return Err(RenderError::InvalidSkybox(id));
            }
            let view = upload_cubemap(device, queue, data).create_view(&wgpu::TextureViewDescriptor {
                label: Some("skybox_cube_view"),
                dimension: Some(wgpu::TextureViewDimension::Cube),
                ..Default::default()
            });
            let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("skybox_cubemap_bind_group"),
                layout: &self.cubemap_layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
                    wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&self.sampler) },
                ],
            });
            cubemaps.insert(id, group);
        }
        log::debug!("skybox cubemaps: {}", cubemaps.len());
        self.cubemaps = cubemaps;
        Ok(())
    }
}

fn upload_cubemap(device: &wgpu::Device, queue: &wgpu::Queue, data: &CubemapData) -> wgpu::Texture {
    let bytes = data.faces.concat();
    device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(&data.name),
            size: wgpu::Extent3d { width: data.size, height: data.size, depth_or_array_layers: 6 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &bytes,
    )
}

impl RenderPass for SkyboxPass {
    /// The lit image, composited in place.
    type Inputs<'a> = &'a wgpu::TextureView;

    fn label(&self) -> &'static str {
        "skybox"
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>, frame: &FrameData<'_>, target: Self::Inputs<'_>) -> RenderResult<()> {
        let camera = frame.scene.camera;
        let Some(id) = camera.skybox else {
            return Ok(());
        };
        let cubemap = self.cubemaps.get(&id).ok_or(RenderError::SkyboxNotFound(id))?;
        let block = SkyBlock { inverse_view_projection: sky_inverse_view_projection(camera).to_cols_array_2d() };
        ctx.queue.write_buffer(&self.sky_buf, 0, bytemuck::bytes_of(&block));

        let mut rp = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("skybox_pass"),
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
        rp.set_bind_group(0, &self.sky_bind_group, &[]);
        rp.set_bind_group(1, cubemap, &[]);
        rp.draw(0..3, 0..1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{Vec3, Vec4};

    fn unproject(m: Mat4, x: f32, y: f32) -> Vec3 {
        let p = m * Vec4::new(x, y, 1.0, 1.0);
        (p.truncate() / p.w).normalize()
    }

    #[test]
    fn sky_block_is_one_matrix() {
        assert_eq!(SKY_BLOCK_SIZE, 64);
    }

    #[test]
    fn screen_center_looks_along_camera_front() {
        let camera = Camera::looking_at(Vec3::new(5.0, 2.0, 3.0), Vec3::new(5.0, 2.0, -7.0));
        let dir = unproject(sky_inverse_view_projection(&camera), 0.0, 0.0);
        assert_relative_eq!(dir.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(dir.y, 0.0, epsilon = 1e-4);
        assert_relative_eq!(dir.z, -1.0, epsilon = 1e-4);
        let right = unproject(sky_inverse_view_projection(&camera), 1.0, 0.0);
        assert!(right.x > 0.0);
        let top = unproject(sky_inverse_view_projection(&camera), 0.0, 1.0);
        assert!(top.y > 0.0);
    }

    #[test]
    fn sky_ignores_camera_position() {
        let a = Camera::looking_at(Vec3::ZERO, Vec3::X);
        let b = Camera::looking_at(Vec3::new(100.0, -40.0, 7.0), Vec3::new(101.0, -40.0, 7.0));
        let (ma, mb) = (sky_inverse_view_projection(&a), sky_inverse_view_projection(&b));
        for (x, y) in [(0.0, 0.0), (0.7, -0.3), (-1.0, 1.0)] {
            let (da, db) = (unproject(ma, x, y), unproject(mb, x, y));
            assert_relative_eq!(da.x, db.x, epsilon = 1e-4);
            assert_relative_eq!(da.y, db.y, epsilon = 1e-4);
            assert_relative_eq!(da.z, db.z, epsilon = 1e-4);
        }
    }
}
