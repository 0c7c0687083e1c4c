//! GPU resources shared by passes: render targets, per-draw uniform arenas, material bindings.

use std::collections::HashMap;
use std::num::NonZeroU64;

use render_api::{AssetContainer, MaterialId, TextureData};
use wgpu::util::DeviceExt;

use crate::error::{RenderError, RenderResult};

/// A texture that passes render into and later sample or load from.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

impl RenderTarget {
    pub fn new(device: &wgpu::Device, label: &str, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        Self::with_layers(device, label, format, width, height, 1)
    }

    pub fn with_layers(
        device: &wgpu::Device,
        label: &str,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        layers: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: layers },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());
        Self { texture, view, format, width, height }
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }

    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// Single-layer 2D view for rendering into one array layer.
    pub fn layer_view(&self, layer: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("render_target_layer"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_array_layer: layer,
            array_layer_count: Some(1),
            ..Default::default()
        })
    }
}

/// Buffer holding one uniform block per element, each at a dynamic-offset-aligned stride.
pub struct UniformArena {
    label: &'static str,
    buffer: wgpu::Buffer,
    block_size: u64,
    stride: u64,
    capacity: u64,
}

impl UniformArena {
    pub fn new(device: &wgpu::Device, label: &'static str, block_size: u64) -> Self {
        let align = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = block_size.div_ceil(align) * align;
        let capacity = 16;
        let buffer = Self::allocate(device, label, stride * capacity);
        Self { label, buffer, block_size, stride, capacity }
    }

    fn allocate(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Writes every block. Grows (and replaces the buffer) when the count exceeds capacity,
    /// so bind groups over the arena must be created after this call.
    pub fn upload<T: bytemuck::Pod>(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, blocks: &[T]) {
        debug_assert_eq!(std::mem::size_of::<T>() as u64, self.block_size);
        let count = blocks.len() as u64;
        if count > self.capacity {
            self.capacity = count.next_power_of_two();
            self.buffer = Self::allocate(device, self.label, self.stride * self.capacity);
            log::debug!("{}: grew to {} blocks", self.label, self.capacity);
        }
        if blocks.is_empty() {
            return;
        }
        let mut bytes = vec![0u8; (self.stride * count) as usize];
        for (i, block) in blocks.iter().enumerate() {
            let start = i * self.stride as usize;
            bytes[start..start + self.block_size as usize].copy_from_slice(bytemuck::bytes_of(block));
        }
        queue.write_buffer(&self.buffer, 0, &bytes);
    }

    pub fn offset(&self, index: usize) -> u32 {
        (index as u64 * self.stride) as u32
    }

    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: 0,
            size: NonZeroU64::new(self.block_size),
        })
    }

    pub fn layout_entry(binding: u32, visibility: wgpu::ShaderStages, block_size: u64) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(block_size),
            },
            count: None,
        }
    }
}

pub fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages, size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(size),
        },
        count: None,
    }
}

pub fn uniform_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Per-material diffuse texture bind groups. Untextured materials bind a 1x1 placeholder
/// that the G-buffer shader never selects.
pub struct MaterialBindings {
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    placeholder: wgpu::TextureView,
    groups: HashMap<MaterialId, wgpu::BindGroup>,
}

impl MaterialBindings {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
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
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let placeholder = upload_texture(device, queue, &TextureData::solid("placeholder", [255; 4]))
            .create_view(&Default::default());
        Self { layout, sampler, placeholder, groups: HashMap::new() }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    /// Uploads every referenced texture and rebuilds one bind group per material. On error the
    /// previous bindings are kept.
    pub fn rebuild(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, assets: &AssetContainer) -> RenderResult<()> {
        let mut views = HashMap::new();
        let mut groups = HashMap::new();
        for (id, material) in &assets.materials {
            let view = match material.diffuse_texture {
                Some(tex_id) => {
                    if !views.contains_key(&tex_id) {
                        let data = assets.texture(tex_id).ok_or(RenderError::TextureNotFound(tex_id))?;
                        let expected = data.width as u64 * data.height as u64 * 4;
                        if expected == 0 || data.rgba8.len() as u64 != expected {
                            return Err(RenderError::InvalidTexture(tex_id));
                        }
                        views.insert(tex_id, upload_texture(device, queue, data).create_view(&Default::default()));
                    }
                    &views[&tex_id]
                }
                None => &self.placeholder,
            };
            let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("material_bind_group"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(view) },
                    wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&self.sampler) },
                ],
            });
            groups.insert(id, group);
        }
        log::debug!("material bindings: {} materials, {} textures", groups.len(), views.len());
        self.groups = groups;
        Ok(())
    }

    pub fn group(&self, id: MaterialId) -> RenderResult<&wgpu::BindGroup> {
        self.groups.get(&id).ok_or(RenderError::MaterialNotFound(id))
    }
}

fn upload_texture(device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData) -> wgpu::Texture {
    device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(&data.name),
            size: wgpu::Extent3d { width: data.width, height: data.height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &data.rgba8,
    )
}
