//! 2D KD-tree for fixed-radius candidate queries over pixel centers.
//!
//! The tree alternates the split axis by depth and stores interior nodes
//! in a flat array. A radius query prunes subtrees whose splitting plane
//! lies farther than the radius from the query point; reported indices are
//! exact (filtered by true distance), so the result equals a brute-force
//! linear scan.

use nalgebra::Vector2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Internal node stored in a flat array.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
enum Node {
    /// Interior node: split value on `depth % 2` axis, children indices.
    Split { value: f64, left: usize, right: usize },
    /// Leaf node: range [start..end) into the points/indices arrays.
    Leaf { start: usize, end: usize },
}

/// Points per leaf before splitting.
const LEAF_SIZE: usize = 8;

/// A 2D KD-tree over a fixed point set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KdTree2 {
    nodes: Vec<Node>,
    points: Vec<Vector2<f64>>,
    indices: Vec<usize>,
}

impl KdTree2 {
    /// Builds a tree from points; reported query results are indices into
    /// the original `points` slice.
    #[must_use]
    pub fn build(points: &[Vector2<f64>]) -> Self {
        let n = points.len();
        let mut tree = Self {
            nodes: Vec::new(),
            points: points.to_vec(),
            indices: (0..n).collect(),
        };
        if n == 0 {
            return tree;
        }

        let mut order: Vec<usize> = (0..n).collect();
        tree.build_recursive(&mut order, 0, n, 0);

        let old_points = tree.points.clone();
        let old_indices = tree.indices.clone();
        for (new_pos, &old_pos) in order.iter().enumerate() {
            tree.points[new_pos] = old_points[old_pos];
            tree.indices[new_pos] = old_indices[old_pos];
        }

        tree
    }

    /// Number of points in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the tree holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn build_recursive(&mut self, order: &mut [usize], start: usize, end: usize, depth: usize) -> usize {
        let count = end - start;

        if count <= LEAF_SIZE {
            let node_idx = self.nodes.len();
            self.nodes.push(Node::Leaf { start, end });
            return node_idx;
        }

        let axis = depth % 2;
        let median_pos = start + count / 2;
        self.nth_element(order, start, end, median_pos, axis);
        let split_value = self.coord(order[median_pos], axis);

        let node_idx = self.nodes.len();
        // placeholder, patched once both children exist
        self.nodes.push(Node::Leaf { start: 0, end: 0 });

        let left = self.build_recursive(order, start, median_pos, depth + 1);
        let right = self.build_recursive(order, median_pos, end, depth + 1);

        self.nodes[node_idx] = Node::Split {
            value: split_value,
            left,
            right,
        };

        node_idx
    }

    #[inline]
    fn coord(&self, point: usize, axis: usize) -> f64 {
        if axis == 0 {
            self.points[point].x
        } else {
            self.points[point].y
        }
    }

    /// Partial sort placing the k-th element by the given axis coordinate.
    fn nth_element(&self, order: &mut [usize], mut lo: usize, mut hi: usize, k: usize, axis: usize) {
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            let a = self.coord(order[lo], axis);
            let b = self.coord(order[mid], axis);
            let c = self.coord(order[hi - 1], axis);
            let pivot_idx = if (a <= b && b <= c) || (c <= b && b <= a) {
                mid
            } else if (b <= a && a <= c) || (c <= a && a <= b) {
                lo
            } else {
                hi - 1
            };
            order.swap(pivot_idx, hi - 1);
            let pivot_val = self.coord(order[hi - 1], axis);

            let mut store = lo;
            for i in lo..hi - 1 {
                if self.coord(order[i], axis) < pivot_val {
                    order.swap(i, store);
                    store += 1;
                }
            }
            order.swap(store, hi - 1);

            if store == k {
                return;
            } else if k < store {
                hi = store;
            } else {
                lo = store + 1;
            }
        }
    }

    /// Returns the original indices of all points within `radius` of `query`.
    #[must_use]
    pub fn query_radius(&self, query: Vector2<f64>, radius: f64) -> Vec<usize> {
        let mut results = Vec::new();
        if !self.nodes.is_empty() {
            self.query_recursive(0, query, radius * radius, 0, &mut results);
        }
        results
    }

    fn query_recursive(
        &self,
        node_idx: usize,
        query: Vector2<f64>,
        radius_sq: f64,
        depth: usize,
        results: &mut Vec<usize>,
    ) {
        match self.nodes[node_idx] {
            Node::Leaf { start, end } => {
                for i in start..end {
                    let d = self.points[i] - query;
                    if d.x * d.x + d.y * d.y <= radius_sq {
                        results.push(self.indices[i]);
                    }
                }
            }
            Node::Split { value, left, right } => {
                let q = if depth % 2 == 0 { query.x } else { query.y };
                let diff = q - value;

                let (near, far) = if q <= value { (left, right) } else { (right, left) };

                self.query_recursive(near, query, radius_sq, depth + 1, results);
                if diff * diff <= radius_sq {
                    self.query_recursive(far, query, radius_sq, depth + 1, results);
                }
            }
        }
    }
}
