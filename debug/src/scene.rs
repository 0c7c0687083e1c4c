//! Demo scene: a floor, a few primitives, a sky, one sun and a ring of point lights.

use glam::{Mat4, Quat, Vec3};
use render_api::{
    Aabb, AssetContainer, CubemapData, DirectionalLight, DrawCommand, FrameContext, Material, MaterialId, Mesh, MeshId,
    PointLight, Ray, SkyboxId, TextureData,
};
use umbra_spatial::{closest_hit, SpatialTree};

#[derive(Clone, Copy, Debug)]
pub struct SceneObject {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub transform: Mat4,
    pub bounds: Aabb,
}

impl SceneObject {
    pub fn draw_command(&self) -> DrawCommand {
        DrawCommand { mesh: self.mesh, material: self.material, transform: self.transform }
    }
}

pub struct DemoScene {
    pub objects: Vec<SceneObject>,
    pub point_lights: Vec<PointLight>,
    pub sun: DirectionalLight,
    /// Set as the camera's skybox by the demo programs.
    pub sky: SkyboxId,
    tree: SpatialTree<usize>,
}

impl DemoScene {
    /// Builds the asset set and the objects that reference it. The assets go to the backend;
    /// the scene keeps ids and world bounds.
    pub fn build(point_light_count: usize) -> (AssetContainer, Self) {
        let mut assets = AssetContainer::new();
        let cube = assets.add_mesh(Mesh::cube("cube"));
        let sphere = assets.add_mesh(Mesh::uv_sphere("sphere", 24));
        let plane = assets.add_mesh(Mesh::plane("floor"));

        let checker = assets.add_texture(TextureData::checker("checker", 256, 8, [200, 200, 200, 255], [60, 60, 70, 255]));
        let floor_material = assets.add_material(Material { diffuse_texture: Some(checker), ..Material::flat([1.0; 3]) });
        let red = assets.add_material(Material::flat([0.8, 0.15, 0.1]));
        let blue = assets.add_material(Material::flat([0.1, 0.3, 0.85]));
        let white = assets.add_material(Material::flat([0.9, 0.9, 0.9]));
        let sky = assets.add_skybox(CubemapData::gradient("sky", 64, [70, 110, 190, 255], [190, 205, 225, 255], [45, 45, 50, 255]));

        let placements = [
            (plane, floor_material, Mat4::from_scale(Vec3::new(20.0, 1.0, 20.0))),
            (cube, red, Mat4::from_translation(Vec3::new(-2.5, 0.5, 0.0))),
            (
                cube,
                white,
                Mat4::from_scale_rotation_translation(Vec3::splat(0.6), Quat::from_rotation_y(0.7), Vec3::new(0.0, 0.3, -3.0)),
            ),
            (sphere, blue, Mat4::from_translation(Vec3::new(2.5, 1.0, 0.5))),
            (sphere, white, Mat4::from_scale_rotation_translation(Vec3::splat(0.5), Quat::IDENTITY, Vec3::new(0.0, 3.0, 1.5))),
        ];
        let objects: Vec<SceneObject> = placements
            .into_iter()
            .filter_map(|(mesh, material, transform)| {
                let bounds = assets.mesh(mesh)?.bounds().transformed(&transform);
                Some(SceneObject { mesh, material, transform, bounds })
            })
            .collect();

        let tree = SpatialTree::build(objects.iter().enumerate().map(|(i, o)| (i, o.bounds)));
        log::info!("demo scene: {} objects, octree of {} nodes (depth {})", objects.len(), tree.node_count(), tree.depth());

        let scene = Self {
            objects,
            point_lights: ring_of_lights(point_light_count),
            sun: DirectionalLight { direction: Vec3::new(-0.4, -1.0, -0.3), color: Vec3::splat(0.6) },
            sky,
            tree,
        };
        (assets, scene)
    }

    /// Closest object hit by `ray`, if any.
    pub fn pick(&self, ray: &Ray) -> Option<usize> {
        let hits = self.tree.query_hits_in_ray(ray);
        closest_hit(&hits).map(|hit| hit.entity)
    }

    /// Fills `frame` with every object, the lights, and an outline around `selected`.
    pub fn submit(&self, frame: &mut FrameContext, selected: Option<usize>) {
        frame.set_directional_light(self.sun);
        for light in &self.point_lights {
            frame.add_point_light(*light);
        }
        for object in &self.objects {
            frame.queue_draw_command(object.draw_command());
        }
        if let Some(object) = selected.and_then(|i| self.objects.get(i)) {
            frame.queue_highlight(object.draw_command());
        }
    }

    /// Moves the point lights around the ring.
    pub fn animate(&mut self, seconds: f32) {
        let count = self.point_lights.len();
        for (i, light) in self.point_lights.iter_mut().enumerate() {
            light.position = ring_position(i, count, seconds);
        }
    }
}

const RING_COLORS: [Vec3; 4] = [
    Vec3::new(1.0, 0.6, 0.3),
    Vec3::new(0.3, 0.6, 1.0),
    Vec3::new(0.4, 1.0, 0.4),
    Vec3::new(1.0, 0.3, 0.8),
];

fn ring_position(index: usize, count: usize, seconds: f32) -> Vec3 {
    let angle = seconds * 0.5 + index as f32 * std::f32::consts::TAU / count.max(1) as f32;
    Vec3::new(angle.cos() * 5.0, 2.5, angle.sin() * 5.0)
}

fn ring_of_lights(count: usize) -> Vec<PointLight> {
    (0..count)
        .map(|i| PointLight::new(ring_position(i, count, 0.0), RING_COLORS[i % RING_COLORS.len()]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_reference_assets() {
        let (assets, scene) = DemoScene::build(4);
        assert_eq!(scene.objects.len(), 5);
        assert_eq!(scene.point_lights.len(), 4);
        for object in &scene.objects {
            assert!(assets.mesh(object.mesh).is_some());
            assert!(assets.material(object.material).is_some());
        }
        assert!(assets.skybox(scene.sky).is_some_and(|sky| sky.is_complete()));
    }

    #[test]
    fn picking_returns_the_nearest_object() {
        let (_, scene) = DemoScene::build(0);
        // Straight down onto the red cube at (-2.5, 0.5, 0); the floor lies behind it.
        let ray = Ray::new(Vec3::new(-2.5, 10.0, 0.0), Vec3::NEG_Y);
        assert_eq!(scene.pick(&ray), Some(1));
        let miss = Ray::new(Vec3::new(0.0, 10.0, 0.0), Vec3::Y);
        assert_eq!(scene.pick(&miss), None);
    }

    #[test]
    fn submit_queues_one_highlight_for_the_selection() {
        let (_, scene) = DemoScene::build(2);
        let mut frame = FrameContext::new();
        scene.submit(&mut frame, Some(3));
        assert_eq!(frame.draws().len(), scene.objects.len());
        assert_eq!(frame.point_lights().len(), 2);
        assert_eq!(frame.highlights().len(), 1);
        assert_eq!(frame.highlights()[0].mesh, scene.objects[3].mesh);
    }
}
