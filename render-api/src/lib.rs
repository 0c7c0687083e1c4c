//! Shared render API for Umbra.
//! Backend-independent data model (meshes, materials, skyboxes, lights, camera, frame context),
//! bounding-volume math, and the RenderBackend trait the host drives frames through.

mod assets;
mod backend;
mod bounds;
mod camera;
mod frame;
mod mesh;

pub use assets::{AssetContainer, CubemapData, Material, MaterialId, MeshId, SkyboxId, TextureData, TextureId};
pub use backend::{BackendError, RenderBackend, RenderBackendWindow};
pub use bounds::{ray_aabb, sphere_aabb, Aabb, Ray, Sphere};
pub use camera::Camera;
pub use frame::{DirectionalLight, DrawCommand, FrameContext, PointLight, SceneData};
pub use mesh::{Mesh, Vertex};
pub use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
