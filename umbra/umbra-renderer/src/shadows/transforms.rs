//! Light-space matrices for the directional map and the six point-light cube faces.

use glam::{Mat4, Vec3};
use render_api::DirectionalLight;

use crate::config::DirectionalShadowConfig;

pub const CUBE_FACES: usize = 6;
pub const POINT_SHADOW_NEAR: f32 = 0.1;

/// View direction and up vector per cube face, in +X, -X, +Y, -Y, +Z, -Z layer order.
pub const CUBE_FACE_DIRECTIONS: [(Vec3, Vec3); CUBE_FACES] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

/// Pretend light position: backed off from the origin against the light direction.
pub fn directional_light_eye(light: &DirectionalLight, cfg: &DirectionalShadowConfig) -> Vec3 {
    -light.direction.normalize_or(Vec3::NEG_Y) * cfg.distance
}

pub fn directional_light_space(light: &DirectionalLight, cfg: &DirectionalShadowConfig) -> Mat4 {
    let eye = directional_light_eye(light, cfg);
    let dir = light.direction.normalize_or(Vec3::NEG_Y);
    let up = if dir.cross(Vec3::Y).length_squared() < 1e-6 { Vec3::Z } else { Vec3::Y };
    let h = cfg.half_extent;
    Mat4::orthographic_rh(-h, h, -h, h, cfg.near, cfg.far) * Mat4::look_at_rh(eye, Vec3::ZERO, up)
}

/// Projection times view for each cube face. Rows are flipped in y because wgpu stores
/// framebuffer row 0 at the top, while the face up vectors follow the cube-map convention
/// of a bottom-up framebuffer.
pub fn point_light_face_transforms(position: Vec3, far_plane: f32) -> [Mat4; CUBE_FACES] {
    let flip = Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0));
    let proj = flip * Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, POINT_SHADOW_NEAR, far_plane);
    CUBE_FACE_DIRECTIONS.map(|(dir, up)| proj * Mat4::look_at_rh(position, position + dir, up))
}

/// Depth-array layer of a light's cube face.
pub fn cube_layer(light_index: usize, face: usize) -> u32 {
    (CUBE_FACES * light_index + face) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;

    #[test]
    fn downward_light_sits_above_origin() {
        let cfg = DirectionalShadowConfig::default();
        let light = DirectionalLight { direction: Vec3::NEG_Y, color: Vec3::ONE };
        let eye = directional_light_eye(&light, &cfg);
        assert_relative_eq!(eye.x, 0.0);
        assert_relative_eq!(eye.y, 50.0);
        assert_relative_eq!(eye.z, 0.0);
    }

    #[test]
    fn origin_projects_to_map_center() {
        let cfg = DirectionalShadowConfig::default();
        let light = DirectionalLight { direction: Vec3::new(-0.3, -1.0, -0.2), color: Vec3::ONE };
        let p = directional_light_space(&light, &cfg).project_point3(Vec3::ZERO);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, (cfg.distance - cfg.near) / (cfg.far - cfg.near), epsilon = 1e-5);
    }

    #[test]
    fn vertical_light_matrix_is_finite() {
        let cfg = DirectionalShadowConfig::default();
        let light = DirectionalLight { direction: Vec3::NEG_Y, color: Vec3::ONE };
        let m = directional_light_space(&light, &cfg);
        assert!(m.to_cols_array().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn layer_index_is_six_per_light() {
        assert_eq!(cube_layer(0, 0), 0);
        assert_eq!(cube_layer(2, 5), 17);
    }

    #[test]
    fn each_face_centers_its_axis() {
        let pos = Vec3::new(1.0, 2.0, 3.0);
        let faces = point_light_face_transforms(pos, 50.0);
        for (m, (dir, _)) in faces.iter().zip(CUBE_FACE_DIRECTIONS) {
            let clip = *m * Vec4::from((pos + dir * 10.0, 1.0));
            let ndc = clip.truncate() / clip.w;
            assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-4);
            assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-4);
            assert!(ndc.z > 0.0 && ndc.z < 1.0);
        }
    }

    #[test]
    fn positive_x_face_matches_cube_sampling() {
        // Cube sampling on +X maps +Y directions to the top rows and -Z to the right columns.
        let faces = point_light_face_transforms(Vec3::ZERO, 50.0);
        let up = faces[0].project_point3(Vec3::new(10.0, 5.0, 0.0));
        let right = faces[0].project_point3(Vec3::new(10.0, 0.0, -5.0));
        assert!(up.y > 0.0);
        assert!(right.x > 0.0);
    }
}
