//! Experimental module variant for arbitrary pixel shapes.
//!
//! Regular modules assume a rectangular tile that a uniform grid covers
//! well. This variant drops both assumptions: the inside test runs against
//! the convex hull of all pixel vertices, and point queries go through a
//! KD-tree over pixel centers with a search radius equal to the largest
//! pixel reach. Channels are plain attributes on the pixels rather than
//! containers.

use std::collections::HashMap;

use nalgebra::{Vector2, Vector3};
use tpcmap_algorithms::KdTree2;
use tpcmap_core::geom::{convex_hull, point_in_convex_polygon};
use tpcmap_core::{Pixel, PIXEL_TOLERANCE};

use crate::error::Result;
use crate::plane::frame_axes;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A pixel tagged with the channel it belongs to.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExperimentalPixel {
    pixel: Pixel,
    channel_id: u16,
}

impl ExperimentalPixel {
    #[must_use]
    pub fn new(pixel: Pixel, channel_id: u16) -> Self {
        Self { pixel, channel_id }
    }

    /// Axis-aligned rectangular pixel.
    pub fn rectangle(
        origin: Vector2<f64>,
        size: Vector2<f64>,
        channel_id: u16,
    ) -> Result<Self> {
        Ok(Self::new(Pixel::rectangle(origin, size, 0.0)?, channel_id))
    }

    /// Square pixel centered on a point.
    pub fn square(center: Vector2<f64>, side: f64, channel_id: u16) -> Result<Self> {
        Ok(Self::new(Pixel::square(center, side)?, channel_id))
    }

    /// The pixel geometry.
    #[inline]
    #[must_use]
    pub fn pixel(&self) -> &Pixel {
        &self.pixel
    }

    /// The owning channel id.
    #[inline]
    #[must_use]
    pub fn channel_id(&self) -> u16 {
        self.channel_id
    }
}

/// A free-form module whose spatial index is hull plus KD-tree.
///
/// The hull, tree, channel index and search radius all derive from the
/// pixel set. They are rebuilt wholesale by [`Self::set_pixels`], never
/// patched in place.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExperimentalModule {
    name: String,
    position: Vector3<f64>,
    normal: Vector3<f64>,
    rotation_deg: f64,
    height: f64,
    axis_x: Vector3<f64>,
    axis_y: Vector3<f64>,
    pixels: Vec<ExperimentalPixel>,
    hull: Vec<Vector2<f64>>,
    centers: Vec<Vector2<f64>>,
    kdtree: Option<KdTree2>,
    search_radius: f64,
    channel_index: HashMap<u16, Vec<usize>>,
}

impl ExperimentalModule {
    /// Creates an empty module at the origin with a +z normal.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Vector3::zeros(),
            normal: Vector3::z(),
            rotation_deg: 0.0,
            height: 0.0,
            axis_x: Vector3::x(),
            axis_y: Vector3::y(),
            pixels: Vec::new(),
            hull: Vec::new(),
            centers: Vec::new(),
            kdtree: None,
            search_radius: 0.0,
            channel_index: HashMap::new(),
        }
    }

    /// Module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Anchor position in the detector frame.
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn set_position(&mut self, position: Vector3<f64>) {
        self.position = position;
    }

    /// Unit normal of the module surface.
    #[inline]
    #[must_use]
    pub fn normal(&self) -> Vector3<f64> {
        self.normal
    }

    /// Sets the orientation and rebuilds the local axes.
    pub fn set_orientation(&mut self, normal: Vector3<f64>, rotation_deg: f64) -> Result<()> {
        let unit = normal.normalize();
        let (ax, ay) = frame_axes(unit, rotation_deg)?;
        self.normal = unit;
        self.rotation_deg = rotation_deg;
        self.axis_x = ax;
        self.axis_y = ay;
        Ok(())
    }

    /// Drift height above the module surface.
    #[inline]
    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn set_height(&mut self, height: f64) {
        self.height = height;
    }

    /// Number of pixels.
    #[inline]
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Bounds-checked pixel access.
    #[must_use]
    pub fn pixel(&self, index: usize) -> Option<&ExperimentalPixel> {
        self.pixels.get(index)
    }

    /// Iterates over the pixels.
    pub fn pixels(&self) -> impl Iterator<Item = &ExperimentalPixel> {
        self.pixels.iter()
    }

    /// Boundary hull of all pixel vertices, counter-clockwise.
    #[must_use]
    pub fn hull(&self) -> &[Vector2<f64>] {
        &self.hull
    }

    /// KD-tree query radius derived from the largest pixel.
    #[inline]
    #[must_use]
    pub fn search_radius(&self) -> f64 {
        self.search_radius
    }

    /// Channel ids present on this module, unordered.
    pub fn channel_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.channel_index.keys().copied()
    }

    /// Replaces the pixel set and rebuilds every derived structure.
    ///
    /// The hull covers all pixel vertices, the KD-tree indexes pixel
    /// centers, and the search radius becomes the largest center-to-vertex
    /// distance over all pixels, so any pixel containing a point has its
    /// center within the query radius of that point.
    pub fn set_pixels(&mut self, pixels: Vec<ExperimentalPixel>) {
        self.pixels = pixels;

        let mut vertices = Vec::new();
        self.centers.clear();
        self.channel_index.clear();
        self.search_radius = 0.0;

        for (index, px) in self.pixels.iter().enumerate() {
            vertices.extend_from_slice(px.pixel.vertices());
            self.centers.push(px.pixel.center());
            self.search_radius = self.search_radius.max(px.pixel.radius());
            self.channel_index
                .entry(px.channel_id)
                .or_default()
                .push(index);
        }

        self.hull = convex_hull(&vertices);
        self.kdtree = if self.centers.is_empty() {
            None
        } else {
            Some(KdTree2::build(&self.centers))
        };
    }

    /// Indices of the pixels whose channel id matches.
    #[must_use]
    pub fn pixels_for_channel(&self, channel_id: u16) -> &[usize] {
        self.channel_index
            .get(&channel_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // ---- coordinate transforms ---------------------------------------

    /// Projects a detector-frame position onto the module surface frame.
    #[must_use]
    pub fn to_local(&self, position: Vector3<f64>) -> Vector2<f64> {
        let rel = position - self.position;
        Vector2::new(rel.dot(&self.axis_x), rel.dot(&self.axis_y))
    }

    /// Lifts a surface-frame point back into the detector frame.
    #[must_use]
    pub fn to_world(&self, local: Vector2<f64>) -> Vector3<f64> {
        self.position + local.x * self.axis_x + local.y * self.axis_y
    }

    /// Signed drift distance of a position along the module normal.
    #[inline]
    #[must_use]
    pub fn z_of(&self, position: Vector3<f64>) -> f64 {
        (position - self.position).dot(&self.normal)
    }

    // ---- queries -----------------------------------------------------

    /// Hull containment test in the surface frame.
    #[must_use]
    pub fn is_inside(&self, local: Vector2<f64>) -> bool {
        self.hull.len() >= 3 && point_in_convex_polygon(local, &self.hull, PIXEL_TOLERANCE)
    }

    /// 3D containment: hull test on the projection plus the drift slab.
    #[must_use]
    pub fn is_inside_volume(&self, position: Vector3<f64>) -> bool {
        let z = self.z_of(position);
        z >= 0.0 && z < self.height && self.is_inside(self.to_local(position))
    }

    /// Indices of pixels whose center lies within the search radius of a
    /// surface-frame point. Candidate set, not exact containment.
    #[must_use]
    pub fn pixels_near(&self, local: Vector2<f64>) -> Vec<usize> {
        match &self.kdtree {
            Some(tree) => tree.query_radius(local, self.search_radius),
            None => Vec::new(),
        }
    }

    /// Indices of pixels that exactly contain a surface-frame point.
    ///
    /// Pixels may overlap at boundaries within tolerance, so this returns
    /// every match rather than the first.
    #[must_use]
    pub fn pixels_containing(&self, local: Vector2<f64>) -> Vec<usize> {
        self.pixels_near(local)
            .into_iter()
            .filter(|&i| self.pixels[i].pixel.contains(local))
            .collect()
    }

    /// Channel ids collecting charge at a surface-frame point, deduplicated.
    #[must_use]
    pub fn channels_at(&self, local: Vector2<f64>) -> Vec<u16> {
        let mut channels: Vec<u16> = self
            .pixels_containing(local)
            .into_iter()
            .map(|i| self.pixels[i].channel_id)
            .collect();
        channels.sort_unstable();
        channels.dedup();
        channels
    }
}
