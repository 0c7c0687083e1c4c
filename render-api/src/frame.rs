//! Per-frame submission: lights, draw commands and the scene snapshot a renderer reads.
//! The host owns a `FrameContext`, fills it each frame and hands it to the backend.

use glam::{Mat4, Vec3};

use crate::assets::{MaterialId, MeshId};
use crate::camera::Camera;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels, world space. Need not be normalised.
    pub direction: Vec3,
    pub color: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self { direction: Vec3::ZERO, color: Vec3::ZERO }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub radius: f32,
}

impl PointLight {
    pub const DEFAULT_RADIUS: f32 = 7.5;

    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color, radius: Self::DEFAULT_RADIUS }
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO)
    }
}

/// One indexed draw: which mesh, which material, where.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCommand {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub transform: Mat4,
}

/// Borrowed view of the frame's lighting and camera. Built fresh for each render call.
#[derive(Clone, Copy, Debug)]
pub struct SceneData<'a> {
    pub camera: &'a Camera,
    pub directional_light: DirectionalLight,
    pub point_lights: &'a [PointLight],
}

/// Accumulates one frame of work. Cleared explicitly with `end_frame`.
#[derive(Default, Debug)]
pub struct FrameContext {
    directional_light: DirectionalLight,
    point_lights: Vec<PointLight>,
    draws: Vec<DrawCommand>,
    highlights: Vec<DrawCommand>,
}

impl FrameContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any light set earlier this frame.
    pub fn set_directional_light(&mut self, light: DirectionalLight) {
        self.directional_light = light;
    }

    pub fn add_point_light(&mut self, light: PointLight) {
        self.point_lights.push(light);
    }

    pub fn queue_draw_command(&mut self, draw: DrawCommand) {
        self.draws.push(draw);
    }

    /// Queues a draw whose bounding box is outlined by the overlay pass.
    pub fn queue_highlight(&mut self, draw: DrawCommand) {
        self.highlights.push(draw);
    }

    pub fn directional_light(&self) -> DirectionalLight { self.directional_light }
    pub fn point_lights(&self) -> &[PointLight] { &self.point_lights }
    pub fn draws(&self) -> &[DrawCommand] { &self.draws }
    pub fn highlights(&self) -> &[DrawCommand] { &self.highlights }

    pub fn scene<'a>(&'a self, camera: &'a Camera) -> SceneData<'a> {
        SceneData {
            camera,
            directional_light: self.directional_light,
            point_lights: &self.point_lights,
        }
    }

    /// Clears the accumulation lists. The directional light persists until overwritten.
    pub fn end_frame(&mut self) {
        self.point_lights.clear();
        self.draws.clear();
        self.highlights.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetContainer;
    use crate::{Material, Mesh};

    #[test]
    fn last_directional_light_wins() {
        let mut frame = FrameContext::new();
        frame.set_directional_light(DirectionalLight { direction: Vec3::NEG_Y, color: Vec3::ONE });
        frame.set_directional_light(DirectionalLight { direction: Vec3::X, color: Vec3::ZERO });
        assert_eq!(frame.directional_light().direction, Vec3::X);
    }

    #[test]
    fn end_frame_clears_queues() {
        let mut assets = AssetContainer::new();
        let mesh = assets.add_mesh(Mesh::cube("cube"));
        let material = assets.add_material(Material::default());
        let mut frame = FrameContext::new();
        let draw = DrawCommand { mesh, material, transform: Mat4::IDENTITY };
        frame.queue_draw_command(draw);
        frame.queue_highlight(draw);
        frame.add_point_light(PointLight::default());
        frame.end_frame();
        assert!(frame.draws().is_empty());
        assert!(frame.highlights().is_empty());
        assert!(frame.point_lights().is_empty());
    }

    #[test]
    fn point_light_default_radius() {
        assert_eq!(PointLight::new(Vec3::ZERO, Vec3::ONE).radius, 7.5);
    }
}
