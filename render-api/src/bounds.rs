//! Axis-aligned boxes, rays, spheres and the intersection tests shared by picking and the octree.

use glam::{Mat4, Vec3};

use crate::mesh::Vertex;

/// Axis-aligned bounding box. `intersects` and `contains` are inclusive on the faces.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self { min: center - half_extents, max: center + half_extents }
    }

    /// Tight box around vertex positions. An empty slice yields the zero box.
    pub fn enclose(vertices: &[Vertex]) -> Self {
        let Some(first) = vertices.first() else {
            return Self::default();
        };
        let start = Vec3::from(first.position);
        vertices.iter().skip(1).fold(Self::new(start, start), |mut acc, v| {
            acc.expand_to_point(Vec3::from(v.position));
            acc
        })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn expand_to_fit(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn expand_to_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        out.expand_to_fit(other);
        out
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        other.min.cmple(self.max).all() && other.max.cmpge(self.min).all()
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        other.min.cmpge(self.min).all() && other.max.cmple(self.max).all()
    }

    /// Corners ordered so that bit 2 of the index selects max x, bit 1 max y, bit 0 max z.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Re-fit after transforming all eight corners.
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(-f32::MAX);
        for corner in self.corners() {
            let p = matrix.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Aabb { min, max }
    }

    /// Splits at the center into eight octants. Index bit 0 selects high x, bit 1 high y, bit 2 high z.
    pub fn octants(&self) -> [Aabb; 8] {
        let (min, max, c) = (self.min, self.max, self.center());
        std::array::from_fn(|i| {
            let lo = Vec3::new(
                if i & 1 != 0 { c.x } else { min.x },
                if i & 2 != 0 { c.y } else { min.y },
                if i & 4 != 0 { c.z } else { min.z },
            );
            let hi = Vec3::new(
                if i & 1 != 0 { max.x } else { c.x },
                if i & 2 != 0 { max.y } else { c.y },
                if i & 4 != 0 { max.z } else { c.z },
            );
            Aabb::new(lo, hi)
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Slab test. Returns the entry distance along the ray, which is negative when the origin is inside the box.
///
/// An axis the ray does not move along is a point, not a slab: it either lies within
/// `[min, max]` (faces included) and leaves the interval open, or the ray misses.
pub fn ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    let mut entry = f32::NEG_INFINITY;
    let mut exit = f32::INFINITY;
    for axis in 0..3 {
        let (origin, dir) = (ray.origin[axis], ray.direction[axis]);
        let (lo, hi) = (aabb.min[axis], aabb.max[axis]);
        if dir == 0.0 {
            if origin < lo || origin > hi {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir;
        let (t0, t1) = ((lo - origin) * inv, (hi - origin) * inv);
        entry = entry.max(t0.min(t1));
        exit = exit.min(t0.max(t1));
    }
    if entry > exit || exit < 0.0 {
        return None;
    }
    Some(entry)
}

/// Closest-point test: the sphere touches the box when the clamped center is within the radius.
pub fn sphere_aabb(sphere: &Sphere, aabb: &Aabb) -> bool {
    let closest = sphere.center.clamp(aabb.min, aabb.max);
    sphere.center.distance_squared(closest) <= sphere.radius * sphere.radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn ray_hits_box_at_entry_distance() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let d = ray_aabb(&ray, &unit_box()).expect("ray should hit");
        assert_relative_eq!(d, 4.0);
    }

    #[test]
    fn ray_pointing_away_misses() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::NEG_Z);
        assert!(ray_aabb(&ray, &unit_box()).is_none());
    }

    #[test]
    fn ray_parallel_outside_slab_misses() {
        let ray = Ray::new(Vec3::new(0.0, 3.0, -5.0), Vec3::Z);
        assert!(ray_aabb(&ray, &unit_box()).is_none());
    }

    #[test]
    fn ray_along_a_face_hits() {
        let b = Aabb::new(Vec3::new(0.0, -1.0, -1.0), Vec3::ONE);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let d = ray_aabb(&ray, &b).expect("ray on the min-x face should hit");
        assert_relative_eq!(d, 4.0);
        let on_edge = Ray::new(Vec3::new(1.0, 1.0, -5.0), Vec3::Z);
        assert_relative_eq!(ray_aabb(&on_edge, &b).expect("edge hit"), 4.0);
    }

    #[test]
    fn ray_from_inside_reports_negative_entry() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let d = ray_aabb(&ray, &unit_box()).expect("origin inside box");
        assert_relative_eq!(d, -1.0);
    }

    #[test]
    fn sphere_touching_face_intersects() {
        let s = Sphere::new(Vec3::new(2.0, 0.0, 0.0), 1.0);
        assert!(sphere_aabb(&s, &unit_box()));
        let far = Sphere::new(Vec3::new(2.5, 0.0, 0.0), 1.0);
        assert!(!sphere_aabb(&far, &unit_box()));
    }

    #[test]
    fn boxes_sharing_a_face_intersect() {
        let a = unit_box();
        let b = Aabb::new(Vec3::new(1.0, -1.0, -1.0), Vec3::new(3.0, 1.0, 1.0));
        assert!(a.intersects(&b));
        let c = Aabb::new(Vec3::new(1.5, -1.0, -1.0), Vec3::new(3.0, 1.0, 1.0));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn contains_is_inclusive() {
        let outer = unit_box();
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&Aabb::new(Vec3::ZERO, Vec3::splat(1.5))));
    }

    #[test]
    fn transformed_refits_rotated_box() {
        let rot = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4);
        let b = Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)).transformed(&rot);
        let half_diag = 0.5 * std::f32::consts::SQRT_2;
        assert_relative_eq!(b.max.x, half_diag, epsilon = 1e-5);
        assert_relative_eq!(b.min.z, -half_diag, epsilon = 1e-5);
        assert_relative_eq!(b.max.y, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn octants_tile_parent() {
        let parent = Aabb::new(Vec3::ZERO, Vec3::splat(2.0));
        let oct = parent.octants();
        assert_eq!(oct[0], Aabb::new(Vec3::ZERO, Vec3::ONE));
        assert_eq!(oct[1], Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0)));
        assert_eq!(oct[7], Aabb::new(Vec3::ONE, Vec3::splat(2.0)));
        let mut merged = oct[0];
        for o in &oct[1..] {
            merged.expand_to_fit(o);
        }
        assert_eq!(merged, parent);
    }

    #[test]
    fn enclose_handles_unordered_input() {
        let verts = [
            Vertex::new([1.0, -2.0, 0.0], [0.0; 3], [0.0; 2]),
            Vertex::new([-1.0, 3.0, 0.5], [0.0; 3], [0.0; 2]),
        ];
        let b = Aabb::enclose(&verts);
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 3.0, 0.5));
        assert_eq!(Aabb::enclose(&[]), Aabb::default());
    }
}
