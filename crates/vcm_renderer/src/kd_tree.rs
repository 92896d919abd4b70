//! Static k-d tree over points.
//!
//! Nodes are stored in a flat array in depth-first order: the left child of
//! node `i` is `i + 1` when it exists, the right child index is explicit.
//! Every node holds exactly one point, split on the longest axis of its
//! subtree's bounds at the median.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use vcm_math::{Aabb, Vec3};

const NO_CHILD: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct KdNode {
    point: u32,
    axis: u8,
    has_left: bool,
    right: u32,
}

/// A point found by a nearest-neighbour query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    pub index: u32,
    pub distance_squared: f32,
}

impl Eq for Neighbour {}

impl PartialOrd for Neighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbour {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_squared
            .total_cmp(&other.distance_squared)
            .then(self.index.cmp(&other.index))
    }
}

#[derive(Debug, Clone, Default)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<Vec3>,
}

impl KdTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the tree over `points`, reusing the node storage.
    pub fn build(&mut self, points: &[Vec3]) {
        self.nodes.clear();
        self.points.clear();
        self.points.extend_from_slice(points);
        self.nodes.reserve(points.len());

        let mut indices: Vec<u32> = (0..points.len() as u32).collect();
        self.build_recursive(&mut indices);
    }

    fn build_recursive(&mut self, indices: &mut [u32]) {
        if indices.is_empty() {
            return;
        }

        let bounds = Aabb::from_iter_points(indices.iter().map(|&i| self.points[i as usize]));
        let axis = bounds.longest_axis();
        let mid = indices.len() / 2;
        let points = &self.points;
        indices.select_nth_unstable_by(mid, |&a, &b| {
            points[a as usize][axis]
                .total_cmp(&points[b as usize][axis])
                .then(a.cmp(&b))
        });

        let node_index = self.nodes.len();
        self.nodes.push(KdNode {
            point: indices[mid],
            axis: axis as u8,
            has_left: mid > 0,
            right: NO_CHILD,
        });

        let (left, rest) = indices.split_at_mut(mid);
        let right = &mut rest[1..];
        self.build_recursive(left);
        if !right.is_empty() {
            self.nodes[node_index].right = self.nodes.len() as u32;
            self.build_recursive(right);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: u32) -> Vec3 {
        self.points[index as usize]
    }

    /// Call `f(index, distance_squared)` for every point within `radius`.
    pub fn search_radius(&self, position: Vec3, radius: f32, mut f: impl FnMut(u32, f32)) {
        if self.nodes.is_empty() {
            return;
        }
        self.search_radius_node(0, position, radius * radius, &mut f);
    }

    fn search_radius_node(
        &self,
        node_index: usize,
        position: Vec3,
        radius_squared: f32,
        f: &mut impl FnMut(u32, f32),
    ) {
        let node = self.nodes[node_index];
        let point = self.points[node.point as usize];
        let d2 = point.distance_squared(position);
        if d2 <= radius_squared {
            f(node.point, d2);
        }

        let delta = position[node.axis as usize] - point[node.axis as usize];
        let (near, far) = self.children(node_index, delta);
        if let Some(near) = near {
            self.search_radius_node(near, position, radius_squared, f);
        }
        if let Some(far) = far {
            if delta * delta <= radius_squared {
                self.search_radius_node(far, position, radius_squared, f);
            }
        }
    }

    /// Near and far child for a query on side `delta` of the split plane.
    fn children(&self, node_index: usize, delta: f32) -> (Option<usize>, Option<usize>) {
        let node = self.nodes[node_index];
        let left = node.has_left.then_some(node_index + 1);
        let right = (node.right != NO_CHILD).then_some(node.right as usize);
        if delta <= 0.0 {
            (left, right)
        } else {
            (right, left)
        }
    }

    /// The `k` nearest points accepted by `accept`, closest first. The
    /// result is written into `out`, which is cleared first.
    pub fn k_nearest(
        &self,
        position: Vec3,
        k: usize,
        accept: impl Fn(u32) -> bool,
        out: &mut Vec<Neighbour>,
    ) {
        out.clear();
        if k == 0 || self.nodes.is_empty() {
            return;
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.k_nearest_node(0, position, k, &accept, &mut heap);
        out.extend(heap.into_sorted_vec());
    }

    fn k_nearest_node(
        &self,
        node_index: usize,
        position: Vec3,
        k: usize,
        accept: &impl Fn(u32) -> bool,
        heap: &mut BinaryHeap<Neighbour>,
    ) {
        let node = self.nodes[node_index];
        let point = self.points[node.point as usize];
        if accept(node.point) {
            let candidate = Neighbour {
                index: node.point,
                distance_squared: point.distance_squared(position),
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }

        let delta = position[node.axis as usize] - point[node.axis as usize];
        let (near, far) = self.children(node_index, delta);
        if let Some(near) = near {
            self.k_nearest_node(near, position, k, accept, heap);
        }
        if let Some(far) = far {
            let worst = match heap.peek() {
                Some(worst) if heap.len() == k => worst.distance_squared,
                _ => f32::INFINITY,
            };
            if delta * delta <= worst {
                self.k_nearest_node(far, position, k, accept, heap);
            }
        }
    }

    /// Closest point accepted by `accept`.
    pub fn nearest(&self, position: Vec3, accept: impl Fn(u32) -> bool) -> Option<Neighbour> {
        let mut out = Vec::with_capacity(1);
        self.k_nearest(position, 1, accept, &mut out);
        out.first().copied()
    }
}
