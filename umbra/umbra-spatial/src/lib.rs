//! Umbra spatial partitioning: an arena octree over entity bounding boxes, used for
//! picking (ray queries) and range queries (sphere).

mod octree;

pub use octree::{closest_hit, RayHit, SpatialTree, TreeEntry, MAX_TREE_DEPTH, MAX_TREE_STORAGE};
