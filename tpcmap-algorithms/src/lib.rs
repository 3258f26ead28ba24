//! tpcmap-algorithms: Spatial indexing structures for readout mapping.
//!
//! Provides the uniform grid mapping used by readout modules and the 2D
//! KD-tree used by the experimental hull-based module variant.

pub mod kdtree;
pub mod mapping;

pub use kdtree::KdTree2;
pub use mapping::GridMapping;
