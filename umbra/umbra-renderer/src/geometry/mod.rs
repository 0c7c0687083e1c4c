//! Geometry buffer: every mesh of the asset set packed into one vertex and one index buffer.
//!
//! Offsets are in elements (vertices / indices), assigned in iteration order, and partition
//! the shared buffers without gaps. The table is rebuilt wholesale when the asset set changes.
//! Each mesh also gets eight bounding-box corners in a separate overlay buffer, drawn with
//! one shared line list.

use std::collections::HashMap;

use render_api::{Mesh, MeshId, Vertex};
use wgpu::util::DeviceExt;

use crate::error::{RenderError, RenderResult};

/// Twelve box edges over `Aabb::corners` ordering.
pub const BOX_LINE_INDICES: [u32; 24] = [0, 1, 1, 3, 3, 2, 2, 0, 4, 5, 5, 7, 7, 6, 6, 4, 0, 4, 1, 5, 2, 6, 3, 7];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshBufferInfo {
    pub index_count: u32,
    pub index_offset: u32,
    pub vertex_offset: u32,
    pub overlay_vertex_offset: u32,
}

/// CPU side of the geometry buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackedGeometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub overlay_vertices: Vec<[f32; 3]>,
    order: Vec<MeshId>,
    entries: HashMap<MeshId, MeshBufferInfo>,
}

impl PackedGeometry {
    pub fn pack<'a>(meshes: impl IntoIterator<Item = (MeshId, &'a Mesh)>) -> Self {
        let mut packed = Self::default();
        for (id, mesh) in meshes {
            let info = MeshBufferInfo {
                index_count: mesh.indices().len() as u32,
                index_offset: packed.indices.len() as u32,
                vertex_offset: packed.vertices.len() as u32,
                overlay_vertex_offset: packed.overlay_vertices.len() as u32,
            };
            packed.vertices.extend_from_slice(mesh.vertices());
            packed.indices.extend_from_slice(mesh.indices());
            packed.overlay_vertices.extend(mesh.bounds().corners().map(|c| c.to_array()));
            packed.order.push(id);
            packed.entries.insert(id, info);
        }
        packed
    }

    pub fn entry(&self, mesh: MeshId) -> RenderResult<&MeshBufferInfo> {
        self.entries.get(&mesh).ok_or(RenderError::MeshNotFound(mesh))
    }

    pub fn vertex_offset_of(&self, mesh: MeshId) -> RenderResult<u32> {
        self.entry(mesh).map(|e| e.vertex_offset)
    }

    pub fn index_offset_of(&self, mesh: MeshId) -> RenderResult<u32> {
        self.entry(mesh).map(|e| e.index_offset)
    }

    /// Entries in packing order.
    pub fn entries(&self) -> impl Iterator<Item = (MeshId, &MeshBufferInfo)> + '_ {
        self.order.iter().map(|id| (*id, &self.entries[id]))
    }

    pub fn mesh_count(&self) -> usize {
        self.order.len()
    }
}

pub struct GeometryBuffer {
    packed: PackedGeometry,
    vertex_buf: wgpu::Buffer,
    index_buf: wgpu::Buffer,
    overlay_vertex_buf: wgpu::Buffer,
    overlay_index_buf: wgpu::Buffer,
}

impl GeometryBuffer {
    pub fn new(device: &wgpu::Device, packed: PackedGeometry) -> Self {
        let vertex_buf = init_buffer(device, "geometry_vertices", bytemuck::cast_slice(&packed.vertices), wgpu::BufferUsages::VERTEX);
        let index_buf = init_buffer(device, "geometry_indices", bytemuck::cast_slice(&packed.indices), wgpu::BufferUsages::INDEX);
        let overlay_vertex_buf = init_buffer(
            device,
            "geometry_overlay_vertices",
            bytemuck::cast_slice(&packed.overlay_vertices),
            wgpu::BufferUsages::VERTEX,
        );
        let overlay_index_buf = init_buffer(device, "geometry_overlay_indices", bytemuck::cast_slice(&BOX_LINE_INDICES), wgpu::BufferUsages::INDEX);
        log::info!(
            "geometry buffer: {} meshes, {} vertices, {} indices",
            packed.mesh_count(),
            packed.vertices.len(),
            packed.indices.len()
        );
        Self { packed, vertex_buf, index_buf, overlay_vertex_buf, overlay_index_buf }
    }

    pub fn packed(&self) -> &PackedGeometry {
        &self.packed
    }

    pub fn entry(&self, mesh: MeshId) -> RenderResult<&MeshBufferInfo> {
        self.packed.entry(mesh)
    }

    /// Sets the shared vertex and index buffers on a pass.
    pub fn bind(&self, rp: &mut wgpu::RenderPass<'_>) {
        rp.set_vertex_buffer(0, self.vertex_buf.slice(..));
        rp.set_index_buffer(self.index_buf.slice(..), wgpu::IndexFormat::Uint32);
    }

    /// One indexed draw over the mesh's slice of the shared buffers. Requires `bind`.
    pub fn draw(&self, rp: &mut wgpu::RenderPass<'_>, mesh: MeshId) -> RenderResult<()> {
        let e = self.entry(mesh)?;
        rp.draw_indexed(e.index_offset..e.index_offset + e.index_count, e.vertex_offset as i32, 0..1);
        Ok(())
    }

    pub fn bind_overlay(&self, rp: &mut wgpu::RenderPass<'_>) {
        rp.set_vertex_buffer(0, self.overlay_vertex_buf.slice(..));
        rp.set_index_buffer(self.overlay_index_buf.slice(..), wgpu::IndexFormat::Uint32);
    }

    /// Bounding-box line list for one mesh. Requires `bind_overlay`.
    pub fn draw_overlay(&self, rp: &mut wgpu::RenderPass<'_>, mesh: MeshId) -> RenderResult<()> {
        let e = self.entry(mesh)?;
        rp.draw_indexed(0..BOX_LINE_INDICES.len() as u32, e.overlay_vertex_offset as i32, 0..1);
        Ok(())
    }
}

/// Zero-length contents get a 4-byte buffer; wgpu rejects binding empty slices.
fn init_buffer(device: &wgpu::Device, label: &str, contents: &[u8], usage: wgpu::BufferUsages) -> wgpu::Buffer {
    if contents.is_empty() {
        return device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: wgpu::COPY_BUFFER_ALIGNMENT,
            usage,
            mapped_at_creation: false,
        });
    }
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor { label: Some(label), contents, usage })
}

#[cfg(test)]
mod tests {
    use super::*;
    use render_api::AssetContainer;

    fn sample_assets() -> AssetContainer {
        let mut assets = AssetContainer::new();
        assets.add_mesh(Mesh::cube("cube"));
        assets.add_mesh(Mesh::plane("plane"));
        assets.add_mesh(Mesh::uv_sphere("sphere", 8));
        assets
    }

    #[test]
    fn offsets_partition_buffers() {
        let assets = sample_assets();
        let packed = PackedGeometry::pack(&assets.meshes);
        let mut next_vertex = 0;
        let mut next_index = 0;
        for (id, e) in packed.entries() {
            let mesh = assets.mesh(id).expect("packed mesh exists");
            assert_eq!(e.vertex_offset, next_vertex);
            assert_eq!(e.index_offset, next_index);
            assert_eq!(e.index_count as usize, mesh.indices().len());
            next_vertex += mesh.vertices().len() as u32;
            next_index += e.index_count;
        }
        assert_eq!(next_vertex as usize, packed.vertices.len());
        assert_eq!(next_index as usize, packed.indices.len());
        assert_eq!(packed.overlay_vertices.len(), 8 * packed.mesh_count());
    }

    #[test]
    fn packing_is_idempotent() {
        let assets = sample_assets();
        let a = PackedGeometry::pack(&assets.meshes);
        let b = PackedGeometry::pack(&assets.meshes);
        assert_eq!(a, b);
        let offsets_a: Vec<_> = a.entries().map(|(id, e)| (id, *e)).collect();
        let offsets_b: Vec<_> = b.entries().map(|(id, e)| (id, *e)).collect();
        assert_eq!(offsets_a, offsets_b);
    }

    #[test]
    fn unknown_mesh_is_an_error() {
        let mut assets = sample_assets();
        let packed = PackedGeometry::pack(&assets.meshes);
        let late = assets.add_mesh(Mesh::cube("late"));
        assert!(matches!(packed.vertex_offset_of(late), Err(RenderError::MeshNotFound(id)) if id == late));
        assert!(matches!(packed.index_offset_of(late), Err(RenderError::MeshNotFound(_))));
    }

    #[test]
    fn empty_set_packs_to_nothing() {
        let assets = AssetContainer::new();
        let packed = PackedGeometry::pack(&assets.meshes);
        assert_eq!(packed.mesh_count(), 0);
        assert!(packed.vertices.is_empty());
        assert!(packed.indices.is_empty());
    }

    #[test]
    fn overlay_corners_match_bounds() {
        let mut assets = AssetContainer::new();
        let id = assets.add_mesh(Mesh::cube("cube"));
        let packed = PackedGeometry::pack(&assets.meshes);
        let e = packed.entry(id).expect("cube packed");
        assert_eq!(packed.overlay_vertices[e.overlay_vertex_offset as usize], [-0.5, -0.5, -0.5]);
        assert_eq!(packed.overlay_vertices[e.overlay_vertex_offset as usize + 7], [0.5, 0.5, 0.5]);
    }
}
