//! Readout pixel: an immutable convex polygon in the module-local frame.

use crate::error::{Error, Result};
use crate::geom::{convex_hull, point_in_convex_polygon, rotate_deg};
use nalgebra::Vector2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default containment tolerance in mm.
pub const PIXEL_TOLERANCE: f64 = 1e-6;

/// The most elementary component of a readout: a convex polygon owned by a
/// readout channel.
///
/// Vertices are stored as the convex hull of the construction input, in
/// counter-clockwise order. The centroid and the maximum vertex-to-centroid
/// distance are precomputed; a pixel never changes after construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pixel {
    vertices: Vec<Vector2<f64>>,
    center: Vector2<f64>,
    radius: f64,
    tolerance: f64,
}

impl Pixel {
    /// Creates a pixel from an arbitrary vertex set.
    ///
    /// The convex hull of the input is taken as the pixel boundary.
    ///
    /// # Errors
    /// Returns [`Error::DegeneratePixel`] when fewer than three
    /// non-collinear vertices remain after hull computation.
    pub fn from_vertices(vertices: &[Vector2<f64>]) -> Result<Self> {
        let hull = convex_hull(vertices);
        if hull.len() < 3 {
            return Err(Error::DegeneratePixel(hull.len()));
        }

        let mut center = Vector2::zeros();
        for &v in &hull {
            center += v;
        }
        center /= hull.len() as f64;

        let radius = hull
            .iter()
            .map(|&v| (v - center).norm())
            .fold(0.0_f64, f64::max);

        Ok(Self {
            vertices: hull,
            center,
            radius,
            tolerance: PIXEL_TOLERANCE,
        })
    }

    /// Creates a rectangular pixel from its left-bottom corner, size and a
    /// rotation in degrees about that corner.
    ///
    /// # Errors
    /// Returns [`Error::DegeneratePixel`] when either side is zero.
    pub fn rectangle(origin: Vector2<f64>, size: Vector2<f64>, rotation_deg: f64) -> Result<Self> {
        let corners = [
            Vector2::new(0.0, 0.0),
            Vector2::new(size.x, 0.0),
            Vector2::new(size.x, size.y),
            Vector2::new(0.0, size.y),
        ];
        let vertices: Vec<_> = corners
            .iter()
            .map(|&c| origin + rotate_deg(c, rotation_deg))
            .collect();
        Self::from_vertices(&vertices)
    }

    /// Creates a square pixel centered on a point.
    ///
    /// # Errors
    /// Returns [`Error::DegeneratePixel`] when the side is zero.
    pub fn square(center: Vector2<f64>, side: f64) -> Result<Self> {
        let half = side / 2.0;
        Self::rectangle(center - Vector2::new(half, half), Vector2::new(side, side), 0.0)
    }

    /// Creates a right-triangle pixel with legs along the local axes,
    /// rotated in degrees about the origin corner.
    ///
    /// # Errors
    /// Returns [`Error::DegeneratePixel`] when either leg is zero.
    pub fn triangle(origin: Vector2<f64>, size: Vector2<f64>, rotation_deg: f64) -> Result<Self> {
        let corners = [
            Vector2::new(0.0, 0.0),
            Vector2::new(size.x, 0.0),
            Vector2::new(0.0, size.y),
        ];
        let vertices: Vec<_> = corners
            .iter()
            .map(|&c| origin + rotate_deg(c, rotation_deg))
            .collect();
        Self::from_vertices(&vertices)
    }

    /// Overrides the containment tolerance in mm.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Tests whether a module-local point falls inside the pixel.
    #[inline]
    #[must_use]
    pub fn contains(&self, point: Vector2<f64>) -> bool {
        point_in_convex_polygon(point, &self.vertices, self.tolerance)
    }

    /// Returns the vertex centroid.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Vector2<f64> {
        self.center
    }

    /// Returns the maximum vertex-to-centroid distance.
    #[inline]
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Returns the hull vertices in counter-clockwise order.
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[Vector2<f64>] {
        &self.vertices
    }

    /// Returns a vertex by index, wrapping around the hull.
    #[must_use]
    pub fn vertex(&self, n: usize) -> Vector2<f64> {
        self.vertices[n % self.vertices.len()]
    }

    /// Axis-aligned bounding-box extent of the pixel.
    ///
    /// Used by the strip-vs-pixel heuristic on the readout plane.
    #[must_use]
    pub fn extent(&self) -> Vector2<f64> {
        let mut min = self.vertices[0];
        let mut max = self.vertices[0];
        for v in &self.vertices {
            min.x = min.x.min(v.x);
            min.y = min.y.min(v.y);
            max.x = max.x.max(v.x);
            max.y = max.y.max(v.y);
        }
        max - min
    }
}
