//! Perspective camera: view/projection matrices and screen-space picking rays.

use glam::{Mat4, Vec3, Vec4};

use crate::assets::SkyboxId;
use crate::bounds::Ray;

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub front: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
    /// Cubemap drawn behind the lit scene; empty pixels show the clear color without one.
    pub skybox: Option<SkyboxId>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            front: Vec3::NEG_Z,
            up: Vec3::Y,
            fov_y: 45f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            aspect: 1.0,
            skybox: None,
        }
    }
}

impl Camera {
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            front: (target - position).normalize_or(Vec3::NEG_Z),
            ..Self::default()
        }
    }

    /// Yaw and pitch in degrees; yaw 0 faces +X.
    pub fn set_yaw_pitch(&mut self, yaw_deg: f32, pitch_deg: f32) {
        let (yaw, pitch) = (yaw_deg.to_radians(), pitch_deg.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize();
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Depth range 0..1.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// World-space ray through pixel (x, y); origin top-left.
    pub fn screen_ray(&self, x: f32, y: f32, width: u32, height: u32) -> Ray {
        let ndc_x = 2.0 * x / width.max(1) as f32 - 1.0;
        let ndc_y = 1.0 - 2.0 * y / height.max(1) as f32;
        let inv = self.view_projection().inverse();
        let near = inv * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
        let far = inv * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let near = near.truncate() / near.w;
        let far = far.truncate() / far.w;
        Ray::new(self.position, (far - near).normalize_or(self.front))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn center_ray_follows_front() {
        let cam = Camera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let ray = cam.screen_ray(400.0, 300.0, 800, 600);
        assert_relative_eq!(ray.direction.z, -1.0, epsilon = 1e-4);
        assert_eq!(ray.origin, cam.position);
    }

    #[test]
    fn left_edge_ray_points_left() {
        let mut cam = Camera::looking_at(Vec3::ZERO, Vec3::NEG_Z);
        cam.aspect = 2.0;
        let ray = cam.screen_ray(0.0, 50.0, 200, 100);
        assert!(ray.direction.x < 0.0);
        assert_relative_eq!(ray.direction.y, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn yaw_zero_faces_positive_x() {
        let mut cam = Camera::default();
        cam.set_yaw_pitch(0.0, 0.0);
        assert_relative_eq!(cam.front.x, 1.0, epsilon = 1e-6);
    }
}
