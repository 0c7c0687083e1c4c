//! Asset set handed to a backend: meshes, materials, textures and skybox cubemaps keyed by slotmap ids.

use slotmap::{new_key_type, SlotMap};

use crate::mesh::Mesh;

new_key_type! {
    pub struct MeshId;
    pub struct MaterialId;
    pub struct TextureId;
    pub struct SkyboxId;
}

/// Phong-style material. The texture is a weak reference resolved through the owning container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub diffuse_texture: Option<TextureId>,
}

impl Material {
    pub fn flat(diffuse: [f32; 3]) -> Self {
        Self {
            ambient: [0.1; 3],
            diffuse,
            specular: [0.5; 3],
            diffuse_texture: None,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::flat([0.8, 0.8, 0.8])
    }
}

/// Tightly packed RGBA8 pixels, row-major.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub rgba8: Vec<u8>,
}

impl TextureData {
    pub fn solid(name: impl Into<String>, rgba: [u8; 4]) -> Self {
        Self { name: name.into(), width: 1, height: 1, rgba8: rgba.to_vec() }
    }

    /// Two-colour checkerboard with `cells` squares per side.
    pub fn checker(name: impl Into<String>, size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let cell = (size / cells.max(1)).max(1);
        let mut rgba8 = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let c = if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b };
                rgba8.extend_from_slice(&c);
            }
        }
        Self { name: name.into(), width: size, height: size, rgba8 }
    }
}

/// Six square RGBA8 faces in +X, -X, +Y, -Y, +Z, -Z order, each row-major with the
/// usual cube-map orientation (rows run from +Y down on the side faces).
#[derive(Clone, Debug)]
pub struct CubemapData {
    pub name: String,
    pub size: u32,
    pub faces: [Vec<u8>; 6],
}

impl CubemapData {
    /// Sky gradient: `zenith` straight up, `horizon` at eye level, `nadir` straight down.
    pub fn gradient(name: impl Into<String>, size: u32, zenith: [u8; 4], horizon: [u8; 4], nadir: [u8; 4]) -> Self {
        let size = size.max(1);
        let fill = |f: &dyn Fn(u32) -> [u8; 4]| {
            let mut rgba8 = Vec::with_capacity((size * size * 4) as usize);
            for row in 0..size {
                let c = f(row);
                for _ in 0..size {
                    rgba8.extend_from_slice(&c);
                }
            }
            rgba8
        };
        let side = |row: u32| {
            let y = 1.0 - 2.0 * (row as f32 + 0.5) / size as f32;
            if y >= 0.0 {
                lerp_rgba(horizon, zenith, y)
            } else {
                lerp_rgba(horizon, nadir, -y)
            }
        };
        Self {
            name: name.into(),
            size,
            faces: [fill(&side), fill(&side), fill(&|_| zenith), fill(&|_| nadir), fill(&side), fill(&side)],
        }
    }

    /// True when every face holds exactly `size * size` pixels.
    pub fn is_complete(&self) -> bool {
        let expected = self.size as usize * self.size as usize * 4;
        expected > 0 && self.faces.iter().all(|f| f.len() == expected)
    }
}

fn lerp_rgba(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    std::array::from_fn(|i| (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8)
}

/// Owns every mesh, material, texture and skybox a renderer may reference.
#[derive(Default, Debug)]
pub struct AssetContainer {
    pub meshes: SlotMap<MeshId, Mesh>,
    pub materials: SlotMap<MaterialId, Material>,
    pub textures: SlotMap<TextureId, TextureData>,
    pub skyboxes: SlotMap<SkyboxId, CubemapData>,
}

impl AssetContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.insert(mesh)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    pub fn add_texture(&mut self, texture: TextureData) -> TextureId {
        self.textures.insert(texture)
    }

    pub fn add_skybox(&mut self, cubemap: CubemapData) -> SkyboxId {
        self.skyboxes.insert(cubemap)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureData> {
        self.textures.get(id)
    }

    pub fn skybox(&self, id: SkyboxId) -> Option<&CubemapData> {
        self.skyboxes.get(id)
    }

    pub fn find_mesh(&self, name: &str) -> Option<MeshId> {
        self.meshes.iter().find(|(_, m)| m.name() == name).map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_mesh_by_name() {
        let mut assets = AssetContainer::new();
        let cube = assets.add_mesh(Mesh::cube("cube"));
        assets.add_mesh(Mesh::plane("ground"));
        assert_eq!(assets.find_mesh("cube"), Some(cube));
        assert_eq!(assets.find_mesh("missing"), None);
    }

    #[test]
    fn checker_has_full_pixel_buffer() {
        let tex = TextureData::checker("checker", 8, 2, [255; 4], [0, 0, 0, 255]);
        assert_eq!(tex.rgba8.len(), 8 * 8 * 4);
        assert_eq!(&tex.rgba8[0..4], &[255; 4]);
        assert_eq!(&tex.rgba8[16..20], &[0, 0, 0, 255]);
    }

    #[test]
    fn gradient_cubemap_faces() {
        let zenith = [0, 0, 255, 255];
        let horizon = [255, 255, 255, 255];
        let nadir = [0, 0, 0, 255];
        let sky = CubemapData::gradient("sky", 4, zenith, horizon, nadir);
        assert!(sky.is_complete());
        assert_eq!(&sky.faces[2][0..4], &zenith);
        assert_eq!(&sky.faces[3][0..4], &nadir);
        // Side faces brighten towards the horizon rows in the middle.
        let top = &sky.faces[0][0..4];
        let middle = &sky.faces[0][(4 * 4 * 4 / 2)..(4 * 4 * 4 / 2 + 4)];
        assert!(middle[0] > top[0]);
        assert_eq!(top[2], 255);
    }

    #[test]
    fn truncated_cubemap_is_incomplete() {
        let mut sky = CubemapData::gradient("sky", 2, [0; 4], [0; 4], [0; 4]);
        sky.faces[5].truncate(4);
        assert!(!sky.is_complete());
    }
}
