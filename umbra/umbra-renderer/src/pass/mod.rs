//! Render pass contract and the per-frame data every pass reads.
//!
//! A pass is built once (shader, pipeline, owned targets), resized when the viewport
//! changes, and executed each frame. Inputs produced by other passes are handed in per
//! execution through the pass's `Inputs` type, so reallocated targets are always current.

use glam::Mat4;
use render_api::{AssetContainer, DrawCommand, SceneData};

use crate::error::{RenderError, RenderResult};
use crate::geometry::GeometryBuffer;
use crate::resources::{MaterialBindings, UniformArena};

pub trait RenderPass {
    /// Views or values produced earlier in the frame.
    type Inputs<'a>;

    fn label(&self) -> &'static str;

    /// Re-allocates screen-sized targets. Fixed-size passes keep the default.
    fn resize(&mut self, _device: &wgpu::Device, _width: u32, _height: u32) {}

    fn execute(&mut self, ctx: &mut PassContext<'_>, frame: &FrameData<'_>, inputs: Self::Inputs<'_>) -> RenderResult<()>;
}

pub struct PassContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub viewport: (u32, u32),
}

/// Everything a pass needs about the frame being drawn.
pub struct FrameData<'a> {
    pub draws: &'a [DrawCommand],
    pub highlights: &'a [DrawCommand],
    pub scene: SceneData<'a>,
    pub geometry: &'a GeometryBuffer,
    pub materials: &'a MaterialBindings,
    pub draw_uniforms: &'a DrawUniforms,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialBlock {
    pub has_texture: i32,
    pub _pad: [i32; 3],
    pub diffuse: [f32; 4],
}

/// Per-draw uniform block, one per draw command, bound with a dynamic offset.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawBlock {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub material: MaterialBlock,
}

pub const DRAW_BLOCK_SIZE: u64 = std::mem::size_of::<DrawBlock>() as u64;

impl DrawBlock {
    pub fn new(model: Mat4, material: MaterialBlock) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            material,
        }
    }
}

/// Model matrices and materials of the frame's draw queue, written once and shared by
/// every pass that walks the queue.
pub struct DrawUniforms {
    layout: wgpu::BindGroupLayout,
    arena: UniformArena,
    bind_group: wgpu::BindGroup,
}

impl DrawUniforms {
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw_bind_group_layout"),
            entries: &[UniformArena::layout_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                DRAW_BLOCK_SIZE,
            )],
        });
        let arena = UniformArena::new(device, "draw_uniforms", DRAW_BLOCK_SIZE);
        let bind_group = Self::make_bind_group(device, &layout, &arena);
        Self { layout, arena, bind_group }
    }

    fn make_bind_group(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, arena: &UniformArena) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw_bind_group"),
            layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: arena.binding() }],
        })
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Dynamic offset of the `index`-th draw command.
    pub fn offset(&self, index: usize) -> u32 {
        self.arena.offset(index)
    }

    /// Fails fast on a draw whose material is not in the asset set.
    pub fn write(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        draws: &[DrawCommand],
        assets: &AssetContainer,
    ) -> RenderResult<()> {
        let blocks = build_draw_blocks(draws, assets)?;
        self.arena.upload(device, queue, &blocks);
        self.bind_group = Self::make_bind_group(device, &self.layout, &self.arena);
        Ok(())
    }
}

pub fn build_draw_blocks(draws: &[DrawCommand], assets: &AssetContainer) -> RenderResult<Vec<DrawBlock>> {
    draws
        .iter()
        .map(|draw| {
            let material = assets.material(draw.material).ok_or(RenderError::MaterialNotFound(draw.material))?;
            let [r, g, b] = material.diffuse;
            let block = MaterialBlock {
                has_texture: material.diffuse_texture.is_some() as i32,
                _pad: [0; 3],
                diffuse: [r, g, b, 1.0],
            };
            Ok(DrawBlock::new(draw.transform, block))
        })
        .collect()
}

/// Camera matrices for passes that render from the viewer.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraBlock {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

pub const CAMERA_BLOCK_SIZE: u64 = std::mem::size_of::<CameraBlock>() as u64;

impl CameraBlock {
    pub fn from_scene(scene: &SceneData<'_>) -> Self {
        Self {
            projection: scene.camera.projection().to_cols_array_2d(),
            view: scene.camera.view().to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use render_api::{Material, Mesh, TextureData};

    #[test]
    fn block_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<MaterialBlock>(), 32);
        assert_eq!(DRAW_BLOCK_SIZE, 160);
        assert_eq!(CAMERA_BLOCK_SIZE, 128);
    }

    #[test]
    fn material_flag_follows_texture() {
        let mut assets = AssetContainer::new();
        let mesh = assets.add_mesh(Mesh::cube("cube"));
        let tex = assets.add_texture(TextureData::solid("white", [255; 4]));
        let plain = assets.add_material(Material::flat([1.0, 0.0, 0.0]));
        let textured = assets.add_material(Material { diffuse_texture: Some(tex), ..Material::default() });
        let draws = [
            DrawCommand { mesh, material: plain, transform: Mat4::IDENTITY },
            DrawCommand { mesh, material: textured, transform: Mat4::IDENTITY },
        ];
        let blocks = build_draw_blocks(&draws, &assets).expect("materials exist");
        assert_eq!(blocks[0].material.has_texture, 0);
        assert_eq!(blocks[0].material.diffuse, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(blocks[1].material.has_texture, 1);
    }

    #[test]
    fn missing_material_fails_fast() {
        let mut assets = AssetContainer::new();
        let mesh = assets.add_mesh(Mesh::cube("cube"));
        let gone = assets.add_material(Material::default());
        assets.materials.remove(gone);
        let draws = [DrawCommand { mesh, material: gone, transform: Mat4::IDENTITY }];
        assert!(matches!(build_draw_blocks(&draws, &assets), Err(RenderError::MaterialNotFound(_))));
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = Mat4::from_scale(glam::Vec3::new(2.0, 1.0, 1.0));
        let block = DrawBlock::new(model, MaterialBlock { has_texture: 0, _pad: [0; 3], diffuse: [1.0; 4] });
        assert_eq!(block.normal_matrix[0][0], 0.5);
        assert_eq!(block.model[0][0], 2.0);
    }
}
