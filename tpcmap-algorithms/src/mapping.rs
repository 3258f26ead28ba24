//! Uniform-grid spatial index over a module surface.
//!
//! Each grid node holds the (channel, pixel) pair whose area covers the
//! node position, or nothing for dead area. The grid turns point-to-channel
//! queries into an amortized O(1) nearest-node lookup; the owning module
//! runs the seeding/exhaustive build passes and the spiral fallback search
//! on top of this store.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Precomputed node-to-(channel, pixel) grid over `[0, size_x] x [0, size_y]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridMapping {
    nodes_x: usize,
    nodes_y: usize,
    size_x: f64,
    size_y: f64,
    cells: Vec<Option<(usize, usize)>>,
}

impl GridMapping {
    /// Creates an empty mapping with all nodes unset.
    ///
    /// Node centers span the full `[0, size]` range on both axes, so node 0
    /// sits on the lower edge and node `n-1` on the upper edge. At least two
    /// nodes per axis are kept so the pitch stays finite.
    #[must_use]
    pub fn new(nodes_x: usize, nodes_y: usize, size_x: f64, size_y: f64) -> Self {
        let nodes_x = nodes_x.max(2);
        let nodes_y = nodes_y.max(2);
        Self {
            nodes_x,
            nodes_y,
            size_x,
            size_y,
            cells: vec![None; nodes_x * nodes_y],
        }
    }

    /// Number of nodes along x.
    #[inline]
    #[must_use]
    pub fn nodes_x(&self) -> usize {
        self.nodes_x
    }

    /// Number of nodes along y.
    #[inline]
    #[must_use]
    pub fn nodes_y(&self) -> usize {
        self.nodes_y
    }

    /// Total number of nodes.
    #[inline]
    #[must_use]
    pub fn total_nodes(&self) -> usize {
        self.nodes_x * self.nodes_y
    }

    /// Nearest node index along x for a module-local coordinate (clamped).
    #[must_use]
    pub fn node_x(&self, x: f64) -> usize {
        let i = (x / self.size_x * (self.nodes_x - 1) as f64).round();
        i.clamp(0.0, (self.nodes_x - 1) as f64) as usize
    }

    /// Nearest node index along y for a module-local coordinate (clamped).
    #[must_use]
    pub fn node_y(&self, y: f64) -> usize {
        let j = (y / self.size_y * (self.nodes_y - 1) as f64).round();
        j.clamp(0.0, (self.nodes_y - 1) as f64) as usize
    }

    /// Module-local x coordinate of a node.
    #[inline]
    #[must_use]
    pub fn x(&self, node_x: usize) -> f64 {
        node_x as f64 * self.size_x / (self.nodes_x - 1) as f64
    }

    /// Module-local y coordinate of a node.
    #[inline]
    #[must_use]
    pub fn y(&self, node_y: usize) -> f64 {
        node_y as f64 * self.size_y / (self.nodes_y - 1) as f64
    }

    #[inline]
    fn index(&self, node_x: usize, node_y: usize) -> usize {
        node_y * self.nodes_x + node_x
    }

    /// Assigns a (channel, pixel) pair to a node.
    pub fn set(&mut self, node_x: usize, node_y: usize, channel: usize, pixel: usize) {
        let idx = self.index(node_x, node_y);
        self.cells[idx] = Some((channel, pixel));
    }

    /// Returns the (channel, pixel) pair assigned to a node.
    #[inline]
    #[must_use]
    pub fn get(&self, node_x: usize, node_y: usize) -> Option<(usize, usize)> {
        self.cells[self.index(node_x, node_y)]
    }

    /// True when the node has an assignment.
    #[inline]
    #[must_use]
    pub fn is_set(&self, node_x: usize, node_y: usize) -> bool {
        self.get(node_x, node_y).is_some()
    }

    /// Number of nodes still unset.
    #[must_use]
    pub fn unset_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    /// True when every node has an assignment.
    #[must_use]
    pub fn all_nodes_set(&self) -> bool {
        self.unset_count() == 0
    }

    /// Reverse scan: the first node assigned to a given (channel, pixel).
    ///
    /// Cold path, used only for diagnostics.
    #[must_use]
    pub fn node_for(&self, channel: usize, pixel: usize) -> Option<(usize, usize)> {
        self.cells
            .iter()
            .position(|&c| c == Some((channel, pixel)))
            .map(|idx| (idx % self.nodes_x, idx / self.nodes_x))
    }

    /// Wraps a signed node index onto the grid (toroidal indexing).
    ///
    /// A search-continuation convenience for the spiral walk, not a
    /// geometric property of the module.
    #[must_use]
    pub fn wrap_x(&self, node_x: i64) -> usize {
        node_x.rem_euclid(self.nodes_x as i64) as usize
    }

    /// Wraps a signed node index onto the grid along y.
    #[must_use]
    pub fn wrap_y(&self, node_y: i64) -> usize {
        node_y.rem_euclid(self.nodes_y as i64) as usize
    }
}
