//! Octree over entity bounding boxes.
//!
//! Nodes live in a flat arena; an internal node stores the index of the first of its
//! eight contiguous children. Entries whose box straddles an octant boundary are stored
//! in every child they touch, so queries deduplicate before returning.

use std::collections::HashSet;
use std::hash::Hash;

use render_api::{ray_aabb, sphere_aabb, Aabb, Ray, Sphere};

/// Entries a leaf holds before it subdivides.
pub const MAX_TREE_STORAGE: usize = 8;

/// Leaves at this depth accept entries past `MAX_TREE_STORAGE`.
pub const MAX_TREE_DEPTH: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeEntry<E> {
    pub entity: E,
    pub bounds: Aabb,
}

/// An entity whose box the ray entered, with the entry distance along the ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit<E> {
    pub entity: E,
    pub distance: f32,
}

#[derive(Clone, Debug)]
struct Node<E> {
    region: Aabb,
    depth: u32,
    entries: Vec<TreeEntry<E>>,
    first_child: Option<u32>,
}

impl<E> Node<E> {
    fn new(region: Aabb, depth: u32) -> Self {
        Self { region, depth, entries: Vec::new(), first_child: None }
    }

    fn children(&self) -> Option<std::ops::Range<usize>> {
        self.first_child.map(|c| c as usize..c as usize + 8)
    }
}

#[derive(Clone, Debug)]
pub struct SpatialTree<E> {
    nodes: Vec<Node<E>>,
}

impl<E> Default for SpatialTree<E> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<E: Copy + Eq + Hash> SpatialTree<E> {
    /// Empty tree covering `bounds`. Entities outside it are not stored.
    pub fn new(bounds: Aabb) -> Self {
        Self { nodes: vec![Node::new(bounds, 0)] }
    }

    /// Rebuilds from a snapshot. The root region is the union of every entry's box.
    pub fn build(entries: impl IntoIterator<Item = (E, Aabb)>) -> Self {
        let entries: Vec<(E, Aabb)> = entries.into_iter().collect();
        let Some(first) = entries.first() else {
            return Self::default();
        };
        let region = entries.iter().skip(1).fold(first.1, |acc, (_, b)| acc.union(b));
        let mut tree = Self::new(region);
        for (entity, bounds) in entries {
            tree.insert(entity, bounds);
        }
        log::debug!("spatial tree built: {} nodes, depth {}", tree.nodes.len(), tree.depth());
        tree
    }

    /// Returns false when the box misses the root region and nothing was stored.
    pub fn insert(&mut self, entity: E, bounds: Aabb) -> bool {
        match self.nodes.first() {
            Some(root) if root.region.intersects(&bounds) => {
                self.insert_from(&[0], TreeEntry { entity, bounds });
                true
            }
            _ => false,
        }
    }

    fn insert_from(&mut self, start: &[usize], entry: TreeEntry<E>) {
        let mut stack: Vec<usize> = start.to_vec();
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.region.intersects(&entry.bounds) {
                continue;
            }
            if let Some(children) = node.children() {
                stack.extend(children);
                continue;
            }
            if node.entries.len() < MAX_TREE_STORAGE || !self.should_split(idx, &entry) {
                self.nodes[idx].entries.push(entry);
                continue;
            }
            self.subdivide(idx);
            stack.extend(self.nodes[idx].children().into_iter().flatten());
        }
    }

    /// A full leaf splits unless it is at max depth or every entry covers the whole
    /// region; such entries would be copied into all eight children unchanged.
    fn should_split(&self, idx: usize, incoming: &TreeEntry<E>) -> bool {
        let node = &self.nodes[idx];
        if node.depth >= MAX_TREE_DEPTH {
            return false;
        }
        !(incoming.bounds.contains(&node.region)
            && node.entries.iter().all(|e| e.bounds.contains(&node.region)))
    }

    fn subdivide(&mut self, idx: usize) {
        if self.nodes[idx].first_child.is_some() {
            return;
        }
        let first = self.nodes.len();
        let depth = self.nodes[idx].depth + 1;
        for octant in self.nodes[idx].region.octants() {
            self.nodes.push(Node::new(octant, depth));
        }
        self.nodes[idx].first_child = Some(first as u32);
        let entries = std::mem::take(&mut self.nodes[idx].entries);
        let children: Vec<usize> = (first..first + 8).collect();
        for entry in entries {
            self.insert_from(&children, entry);
        }
    }

    /// Every entity whose box the ray enters, each reported once, in no particular order.
    pub fn query_hits_in_ray(&self, ray: &Ray) -> Vec<RayHit<E>> {
        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        let mut stack = if self.nodes.is_empty() { Vec::new() } else { vec![0usize] };
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if ray_aabb(ray, &node.region).is_none() {
                continue;
            }
            match node.children() {
                Some(children) => stack.extend(children),
                None => {
                    for entry in &node.entries {
                        if let Some(distance) = ray_aabb(ray, &entry.bounds) {
                            if seen.insert(entry.entity) {
                                hits.push(RayHit { entity: entry.entity, distance });
                            }
                        }
                    }
                }
            }
        }
        hits
    }

    pub fn query_nodes_in_ray(&self, ray: &Ray) -> Vec<E> {
        self.query_hits_in_ray(ray).into_iter().map(|h| h.entity).collect()
    }

    pub fn query_nodes_in_sphere(&self, sphere: &Sphere) -> Vec<E> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut stack = if self.nodes.is_empty() { Vec::new() } else { vec![0usize] };
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !sphere_aabb(sphere, &node.region) {
                continue;
            }
            match node.children() {
                Some(children) => stack.extend(children),
                None => found.extend(
                    node.entries
                        .iter()
                        .filter(|e| sphere_aabb(sphere, &e.bounds) && seen.insert(e.entity))
                        .map(|e| e.entity),
                ),
            }
        }
        found
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(|n| n.entries.is_empty())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn bounds(&self) -> Option<&Aabb> {
        self.nodes.first().map(|n| &n.region)
    }

    /// Deepest node depth; 0 for a single leaf or an empty tree.
    pub fn depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }
}

/// Nearest hit by entry distance.
pub fn closest_hit<E: Copy>(hits: &[RayHit<E>]) -> Option<RayHit<E>> {
    hits.iter().copied().min_by(|a, b| a.distance.total_cmp(&b.distance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec3;

    fn cube_at(center: Vec3, half: f32) -> Aabb {
        Aabb::from_center_half_extents(center, Vec3::splat(half))
    }

    fn sorted(mut v: Vec<u32>) -> Vec<u32> {
        v.sort_unstable();
        v
    }

    #[test]
    fn test_empty_input_builds_empty_tree() {
        let tree: SpatialTree<u32> = SpatialTree::build(Vec::new());
        assert_eq!(tree.node_count(), 0);
        assert!(tree.is_empty());
        assert!(tree.query_nodes_in_ray(&Ray::new(Vec3::ZERO, Vec3::X)).is_empty());
    }

    #[test]
    fn test_ray_returns_exactly_crossed_entities() {
        let mut entries = Vec::new();
        for (i, z) in [0.0, 4.0, 8.0].into_iter().enumerate() {
            entries.push((i as u32, cube_at(Vec3::new(0.0, 0.0, z), 0.5)));
        }
        for i in 0..17u32 {
            let center = Vec3::new(3.0 + (i % 6) as f32 * 3.0, (i / 6) as f32 * 3.0, (i % 4) as f32 * 2.0);
            entries.push((100 + i, cube_at(center, 0.5)));
        }
        assert_eq!(entries.len(), 20);
        let tree = SpatialTree::build(entries);
        assert!(tree.node_count() > 1);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -10.0), Vec3::Z);
        assert_eq!(sorted(tree.query_nodes_in_ray(&ray)), vec![0, 1, 2]);
    }

    #[test]
    fn test_subdivision_redistributes_entries() {
        let mut entries = Vec::new();
        for octant in 0..8u32 {
            let sign = |bit: u32| if octant & bit != 0 { 1.0 } else { -1.0 };
            entries.push((octant, cube_at(Vec3::new(sign(1), sign(2), sign(4)), 0.25)));
        }
        let mut tree = SpatialTree::build(entries);
        assert_eq!(tree.node_count(), 1);
        assert!(tree.insert(8, cube_at(Vec3::splat(0.9), 0.25)));

        let root = &tree.nodes[0];
        assert!(root.first_child.is_some());
        assert!(root.entries.is_empty());
        let children = root.children().expect("root subdivided");
        let per_child: Vec<usize> = tree.nodes[children].iter().map(|n| n.entries.len()).collect();
        assert_eq!(per_child, vec![1, 1, 1, 1, 1, 1, 1, 2]);
    }

    #[test]
    fn test_ray_hit_distance_and_closest() {
        let tree = SpatialTree::build(vec![
            (1u32, cube_at(Vec3::new(0.0, 0.0, 10.0), 1.0)),
            (2u32, cube_at(Vec3::new(0.0, 0.0, 4.0), 1.0)),
        ]);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let hits = tree.query_hits_in_ray(&ray);
        let nearest = closest_hit(&hits).expect("two hits");
        assert_eq!(nearest.entity, 2);
        assert!((nearest.distance - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_max_depth_leaf_overflows() {
        let mut entries = vec![(0u32, Aabb::new(Vec3::splat(-16.0), Vec3::splat(-15.0)))];
        for i in 1..=10u32 {
            entries.push((i, Aabb::new(Vec3::splat(15.9), Vec3::splat(16.0))));
        }
        let tree = SpatialTree::build(entries);
        assert_eq!(tree.depth(), MAX_TREE_DEPTH);
        assert_eq!(tree.node_count(), 1 + 8 * MAX_TREE_DEPTH as usize);
        let ray = Ray::new(Vec3::new(15.95, 15.95, -100.0), Vec3::Z);
        assert_eq!(sorted(tree.query_nodes_in_ray(&ray)), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_identical_covering_boxes_stay_in_one_leaf() {
        let b = cube_at(Vec3::ZERO, 1.0);
        let tree = SpatialTree::build((0..12u32).map(|i| (i, b)));
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.nodes[0].entries.len(), 12);
    }

    #[test]
    fn test_straddling_entity_reported_once() {
        let mut entries: Vec<(u32, Aabb)> = (0..8u32)
            .map(|i| (i, cube_at(Vec3::new(-4.0 + i as f32, -4.0, -4.0), 0.2)))
            .collect();
        entries.push((99, cube_at(Vec3::ZERO, 1.0)));
        entries.push((100, cube_at(Vec3::splat(4.0), 0.2)));
        let tree = SpatialTree::build(entries);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -20.0), Vec3::Z);
        assert_eq!(tree.query_nodes_in_ray(&ray), vec![99]);
    }

    #[test]
    fn test_ray_along_octant_boundary() {
        let mut entries: Vec<(u32, Aabb)> = (0..8u32)
            .map(|i| {
                let sign = |bit: u32| if i & bit != 0 { 3.0 } else { -3.0 };
                (i, cube_at(Vec3::new(sign(1), sign(2), sign(4)), 0.5))
            })
            .collect();
        // Touches the root center plane x = 0 from the +x side only.
        entries.push((42, Aabb::new(Vec3::new(0.0, -0.5, 1.0), Vec3::new(1.0, 0.5, 2.0))));
        let tree = SpatialTree::build(entries);
        assert!(tree.depth() >= 1);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -10.0), Vec3::Z);
        let hits = tree.query_hits_in_ray(&ray);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity, 42);
        assert_relative_eq!(hits[0].distance, 11.0);
    }

    #[test]
    fn test_sphere_query() {
        let tree = SpatialTree::build(vec![
            (1u32, cube_at(Vec3::ZERO, 0.5)),
            (2u32, cube_at(Vec3::new(5.0, 0.0, 0.0), 0.5)),
            (3u32, cube_at(Vec3::new(50.0, 0.0, 0.0), 0.5)),
        ]);
        let found = sorted(tree.query_nodes_in_sphere(&Sphere::new(Vec3::ZERO, 10.0)));
        assert_eq!(found, vec![1, 2]);
    }

    #[test]
    fn test_insert_outside_root_is_rejected() {
        let mut tree = SpatialTree::new(cube_at(Vec3::ZERO, 1.0));
        assert!(!tree.insert(7u32, cube_at(Vec3::splat(10.0), 0.5)));
        assert!(tree.is_empty());
    }
}
