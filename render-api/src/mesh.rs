//! Vertex layout, immutable meshes and the built-in primitives.

use crate::bounds::Aabb;

/// Interleaved vertex: position, normal, uv. Stride 32 bytes; attribute offsets 0, 12, 24.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }
}

/// Named geometry with its local-space bounds computed once at construction.
#[derive(Clone, Debug)]
pub struct Mesh {
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    bounds: Aabb,
}

impl Mesh {
    pub fn new(name: impl Into<String>, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::enclose(&vertices);
        Self { name: name.into(), vertices, indices, bounds }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn vertices(&self) -> &[Vertex] { &self.vertices }
    pub fn indices(&self) -> &[u32] { &self.indices }
    pub fn bounds(&self) -> &Aabb { &self.bounds }

    /// Unit cube centred on the origin, four vertices per face.
    pub fn cube(name: impl Into<String>) -> Self {
        const FACES: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, -1.0], [[-0.5, -0.5, -0.5], [0.5, -0.5, -0.5], [0.5, 0.5, -0.5], [-0.5, 0.5, -0.5]]),
            ([0.0, 0.0, 1.0], [[-0.5, -0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5]]),
            ([-1.0, 0.0, 0.0], [[-0.5, -0.5, 0.5], [-0.5, 0.5, 0.5], [-0.5, 0.5, -0.5], [-0.5, -0.5, -0.5]]),
            ([1.0, 0.0, 0.0], [[0.5, -0.5, -0.5], [0.5, 0.5, -0.5], [0.5, 0.5, 0.5], [0.5, -0.5, 0.5]]),
            ([0.0, 1.0, 0.0], [[-0.5, 0.5, -0.5], [0.5, 0.5, -0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5]]),
            ([0.0, -1.0, 0.0], [[-0.5, -0.5, -0.5], [0.5, -0.5, -0.5], [0.5, -0.5, 0.5], [-0.5, -0.5, 0.5]]),
        ];
        const UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, corners) in FACES {
            let base = vertices.len() as u32;
            for (corner, uv) in corners.into_iter().zip(UVS) {
                vertices.push(Vertex::new(corner, normal, uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        Self::new(name, vertices, indices)
    }

    /// Radius-1 UV sphere with `segments` rings and slices.
    pub fn uv_sphere(name: impl Into<String>, segments: u32) -> Self {
        let segments = segments.max(3);
        let seg_w = std::f32::consts::TAU / segments as f32;
        let seg_h = std::f32::consts::PI / segments as f32;
        let mut vertices = Vec::with_capacity(((segments + 1) * (segments + 1)) as usize);
        for y in 0..=segments {
            for x in 0..=segments {
                let (xf, yf) = (x as f32, y as f32);
                let p = [
                    (xf * seg_w).cos() * (yf * seg_h).sin(),
                    (yf * seg_h).cos(),
                    (xf * seg_w).sin() * (yf * seg_h).sin(),
                ];
                vertices.push(Vertex::new(p, p, [xf / segments as f32, yf / segments as f32]));
            }
        }
        let row = segments + 1;
        let mut indices = Vec::with_capacity((segments * segments * 6) as usize);
        for y in 0..segments {
            for x in 0..segments {
                let (a, b) = (y * row + x, (y + 1) * row + x);
                indices.extend_from_slice(&[b, a, a + 1, b, a + 1, b + 1]);
            }
        }
        Self::new(name, vertices, indices)
    }

    /// Unit quad in the XZ plane facing +Y.
    pub fn plane(name: impl Into<String>) -> Self {
        let n = [0.0, 1.0, 0.0];
        let vertices = vec![
            Vertex::new([-0.5, 0.0, -0.5], n, [0.0, 0.0]),
            Vertex::new([0.5, 0.0, -0.5], n, [1.0, 0.0]),
            Vertex::new([0.5, 0.0, 0.5], n, [1.0, 1.0]),
            Vertex::new([-0.5, 0.0, 0.5], n, [0.0, 1.0]),
        ];
        Self::new(name, vertices, vec![0, 1, 2, 2, 3, 0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn vertex_stride_is_32() {
        assert_eq!(Vertex::STRIDE, 32);
    }

    #[test]
    fn cube_counts_and_bounds() {
        let cube = Mesh::cube("cube");
        assert_eq!(cube.vertices().len(), 24);
        assert_eq!(cube.indices().len(), 36);
        assert_eq!(cube.bounds().min, Vec3::splat(-0.5));
        assert_eq!(cube.bounds().max, Vec3::splat(0.5));
        assert!(cube.indices().iter().all(|&i| (i as usize) < cube.vertices().len()));
    }

    #[test]
    fn sphere_indices_in_range() {
        let s = Mesh::uv_sphere("sphere", 16);
        assert_eq!(s.vertices().len(), 17 * 17);
        assert_eq!(s.indices().len(), 16 * 16 * 6);
        assert!(s.indices().iter().all(|&i| (i as usize) < s.vertices().len()));
        assert!((s.bounds().max.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn plane_is_flat() {
        let p = Mesh::plane("ground");
        assert_eq!(p.bounds().min.y, 0.0);
        assert_eq!(p.bounds().max.y, 0.0);
        assert_eq!(p.name(), "ground");
    }

    #[test]
    fn empty_mesh_has_zero_bounds() {
        let m = Mesh::new("empty", Vec::new(), Vec::new());
        assert_eq!(*m.bounds(), Aabb::default());
    }
}
