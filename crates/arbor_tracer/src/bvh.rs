//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! The tree is stored as a flat arena of nodes with children referenced by
//! index. It is built top-down with a bucketed Surface Area Heuristic and
//! never mutated afterwards. The BVH does not own the primitives: queries
//! take the same primitive slice the tree was built from.

use crate::{HitRecord, Hittable};
use arbor_math::{Aabb, Interval, Ray, Vec3};
use serde::{Deserialize, Serialize};

/// Centroid extents below this are treated as all centroids coinciding.
const DEGENERATE_EXTENT: f64 = 1e-10;

/// Tuning knobs for SAH construction.
///
/// None of these affect query results, only the shape of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SahConfig {
    /// Number of centroid buckets along the split axis
    pub bucket_count: usize,
    /// Cost of visiting a node, relative to one primitive intersection
    pub traversal_cost: f64,
    /// Ranges this small (or smaller) are split at the median without SAH
    pub median_split_threshold: usize,
}

impl Default for SahConfig {
    fn default() -> Self {
        Self {
            bucket_count: 12,
            traversal_cost: 0.125,
            median_split_threshold: 4,
        }
    }
}

/// BVH node - either a branch with two children or a leaf with one primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BvhNode {
    /// Internal node; `left` and `right` index into the node arena.
    Branch { left: usize, right: usize, bbox: Aabb },
    /// Leaf holding the index of a single primitive.
    Leaf { primitive: usize, bbox: Aabb },
}

impl BvhNode {
    pub fn bbox(&self) -> &Aabb {
        match self {
            BvhNode::Branch { bbox, .. } | BvhNode::Leaf { bbox, .. } => bbox,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BvhNode::Leaf { .. })
    }
}

/// Shape summary of a built tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BvhStats {
    pub node_count: usize,
    pub leaf_count: usize,
    /// Number of nodes on the longest root-to-leaf path (0 for an empty tree)
    pub height: usize,
}

/// Work counters accumulated by [`Bvh::intersect_with_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Nodes whose bounding box was tested against the ray
    pub nodes_visited: u64,
    /// Primitive intersection tests performed at leaves
    pub primitive_tests: u64,
}

impl std::ops::AddAssign for TraversalStats {
    fn add_assign(&mut self, rhs: Self) {
        self.nodes_visited += rhs.nodes_visited;
        self.primitive_tests += rhs.primitive_tests;
    }
}

/// Flat-array BVH over a primitive slice.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    root: Option<usize>,
    stats: BvhStats,
}

impl Bvh {
    /// Build a BVH with the default SAH settings.
    pub fn build<P: Hittable>(primitives: &[P]) -> Self {
        Self::build_with(primitives, &SahConfig::default())
    }

    /// Build a BVH over `primitives`.
    ///
    /// An empty slice produces an empty tree that never reports a hit.
    pub fn build_with<P: Hittable>(primitives: &[P], config: &SahConfig) -> Self {
        if primitives.is_empty() {
            return Self::default();
        }

        let bounds: Vec<Aabb> = primitives.iter().map(|p| p.bounding_box()).collect();
        let centroids: Vec<Vec3> = bounds.iter().map(Aabb::centroid).collect();
        let mut indices: Vec<usize> = (0..primitives.len()).collect();

        let mut builder = BvhBuilder {
            bounds: &bounds,
            centroids: &centroids,
            config,
            nodes: Vec::with_capacity(2 * primitives.len() - 1),
        };
        let root = builder.build_recursive(&mut indices);

        let mut bvh = Self {
            nodes: builder.nodes,
            root: Some(root),
            stats: BvhStats::default(),
        };
        bvh.stats = bvh.compute_stats();

        log::info!(
            "Built BVH: {} primitives, {} nodes, height {}",
            primitives.len(),
            bvh.stats.node_count,
            bvh.stats.height
        );

        bvh
    }

    /// Nearest hit of `ray` within `ray_t`, or `None` if nothing is hit.
    pub fn intersect<P: Hittable>(
        &self,
        primitives: &[P],
        ray: &Ray,
        ray_t: Interval,
    ) -> Option<HitRecord> {
        let mut stats = TraversalStats::default();
        self.intersect_with_stats(primitives, ray, ray_t, &mut stats)
    }

    /// Same as [`Bvh::intersect`], also counting the work done.
    pub fn intersect_with_stats<P: Hittable>(
        &self,
        primitives: &[P],
        ray: &Ray,
        ray_t: Interval,
        stats: &mut TraversalStats,
    ) -> Option<HitRecord> {
        let root = self.root?;
        if ray_t.is_empty() {
            return None;
        }
        self.intersect_node(root, primitives, ray, ray_t, stats)
    }

    fn intersect_node<P: Hittable>(
        &self,
        index: usize,
        primitives: &[P],
        ray: &Ray,
        ray_t: Interval,
        stats: &mut TraversalStats,
    ) -> Option<HitRecord> {
        let node = &self.nodes[index];
        stats.nodes_visited += 1;

        if !node.bbox().hit(ray, ray_t) {
            return None;
        }

        match *node {
            BvhNode::Leaf { primitive, .. } => {
                stats.primitive_tests += 1;
                primitives.get(primitive)?.hit(ray, ray_t)
            }

            BvhNode::Branch { left, right, .. } => {
                let hit_left = self.intersect_node(left, primitives, ray, ray_t, stats);

                // Only check right up to closest hit
                let right_t = hit_left.map_or(ray_t, |rec| ray_t.with_max(rec.t));
                let hit_right = self.intersect_node(right, primitives, ray, right_t, stats);

                hit_right.or(hit_left)
            }
        }
    }

    /// All nodes, root first.
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Index of the root node, `None` for an empty tree.
    pub fn root(&self) -> Option<usize> {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn stats(&self) -> BvhStats {
        self.stats
    }

    /// Bounds of the whole tree (`Aabb::EMPTY` when empty).
    pub fn bounding_box(&self) -> Aabb {
        self.root
            .map_or(Aabb::EMPTY, |root| *self.nodes[root].bbox())
    }

    /// Boxes of every node no deeper than `max_depth` (the root is depth 0),
    /// paired with their depth, parents before children.
    pub fn boxes_to_depth(&self, max_depth: usize) -> Vec<(usize, Aabb)> {
        let mut boxes = Vec::new();
        let mut stack: Vec<(usize, usize)> = self.root.map(|root| (root, 0)).into_iter().collect();

        while let Some((index, depth)) = stack.pop() {
            let node = &self.nodes[index];
            boxes.push((depth, *node.bbox()));

            if let BvhNode::Branch { left, right, .. } = *node {
                if depth < max_depth {
                    stack.push((right, depth + 1));
                    stack.push((left, depth + 1));
                }
            }
        }
        boxes
    }

    fn compute_stats(&self) -> BvhStats {
        let Some(root) = self.root else {
            return BvhStats::default();
        };

        let mut stats = BvhStats {
            node_count: self.nodes.len(),
            ..Default::default()
        };
        let mut stack = vec![(root, 1)];
        while let Some((index, depth)) = stack.pop() {
            stats.height = stats.height.max(depth);
            match self.nodes[index] {
                BvhNode::Leaf { .. } => stats.leaf_count += 1,
                BvhNode::Branch { left, right, .. } => {
                    stack.push((left, depth + 1));
                    stack.push((right, depth + 1));
                }
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SahBucket {
    count: usize,
    bbox: Aabb,
}

/// Scratch state for one top-down build.
struct BvhBuilder<'a> {
    bounds: &'a [Aabb],
    centroids: &'a [Vec3],
    config: &'a SahConfig,
    nodes: Vec<BvhNode>,
}

impl BvhBuilder<'_> {
    /// Build the subtree for `indices` (non-empty) and return its node index.
    fn build_recursive(&mut self, indices: &mut [usize]) -> usize {
        if indices.len() == 1 {
            let primitive = indices[0];
            self.nodes.push(BvhNode::Leaf {
                primitive,
                bbox: self.bounds[primitive],
            });
            return self.nodes.len() - 1;
        }

        let centroid_bounds = indices
            .iter()
            .fold(Aabb::EMPTY, |acc, &i| acc.include_point(self.centroids[i]));
        let axis = centroid_bounds.longest_axis();
        let mid = self.split(indices, axis, &centroid_bounds);

        // Placeholder, overwritten once both children exist
        let node_index = self.nodes.len();
        self.nodes.push(BvhNode::Branch {
            left: node_index,
            right: node_index,
            bbox: Aabb::EMPTY,
        });

        let (left_indices, right_indices) = indices.split_at_mut(mid);
        let left = self.build_recursive(left_indices);
        let right = self.build_recursive(right_indices);
        let bbox = Aabb::merge(self.nodes[left].bbox(), self.nodes[right].bbox());

        self.nodes[node_index] = BvhNode::Branch { left, right, bbox };
        node_index
    }

    /// Reorder `indices` and return the split position; both sides are non-empty.
    fn split(&self, indices: &mut [usize], axis: usize, centroid_bounds: &Aabb) -> usize {
        let count = indices.len();
        if count <= self.config.median_split_threshold {
            return self.median_split(indices, axis);
        }

        let range = centroid_bounds.axis_interval(axis);
        let extent = range.size();
        if extent < DEGENERATE_EXTENT {
            log::trace!("SAH: {count} coincident centroids, median split");
            return self.median_split(indices, axis);
        }

        let bucket_count = self.config.bucket_count.max(2);
        let bucket_of = |c: f64| -> usize {
            let offset = (c - range.min) / extent;
            ((offset * bucket_count as f64) as usize).min(bucket_count - 1)
        };

        let mut buckets = vec![SahBucket::default(); bucket_count];
        for &i in indices.iter() {
            let bucket = &mut buckets[bucket_of(self.centroids[i][axis])];
            bucket.count += 1;
            bucket.bbox = Aabb::merge(&bucket.bbox, &self.bounds[i]);
        }

        let total_area = buckets
            .iter()
            .fold(Aabb::EMPTY, |acc, b| Aabb::merge(&acc, &b.bbox))
            .surface_area();
        if total_area <= f64::EPSILON {
            log::trace!("SAH: zero-area range of {count} primitives, median split");
            return self.median_split(indices, axis);
        }

        // Suffix sweep: everything right of each candidate split
        let mut right_side = vec![SahBucket::default(); bucket_count];
        let mut acc = SahBucket::default();
        for i in (1..bucket_count).rev() {
            acc.count += buckets[i].count;
            acc.bbox = Aabb::merge(&acc.bbox, &buckets[i].bbox);
            right_side[i] = acc;
        }

        // Prefix sweep evaluating the cost of splitting after bucket i
        let mut best: Option<(usize, f64)> = None;
        let mut left = SahBucket::default();
        for i in 0..bucket_count - 1 {
            left.count += buckets[i].count;
            left.bbox = Aabb::merge(&left.bbox, &buckets[i].bbox);
            let right = &right_side[i + 1];

            // Empty sides contribute nothing (area and count are both zero)
            let cost = self.config.traversal_cost
                + (left.count as f64 * left.bbox.surface_area()
                    + right.count as f64 * right.bbox.surface_area())
                    / total_area;

            if best.map_or(true, |(_, best_cost)| cost < best_cost) {
                best = Some((i, cost));
            }
        }

        let Some((split_bucket, _)) = best else {
            return self.median_split(indices, axis);
        };

        let mut mid = 0;
        for i in 0..count {
            if bucket_of(self.centroids[indices[i]][axis]) <= split_bucket {
                indices.swap(i, mid);
                mid += 1;
            }
        }

        if mid == 0 || mid == count {
            log::trace!("SAH: one-sided split of {count} primitives, median split");
            return self.median_split(indices, axis);
        }
        mid
    }

    /// Sort by centroid along `axis` and split at the middle.
    fn median_split(&self, indices: &mut [usize], axis: usize) -> usize {
        indices.sort_unstable_by(|&a, &b| self.centroids[a][axis].total_cmp(&self.centroids[b][axis]));
        indices.len() / 2
    }
}
