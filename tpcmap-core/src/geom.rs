//! 2D geometry primitives: cross products, rotations, convex hulls.

use nalgebra::Vector2;

/// Cross product of the vectors AB and AC.
///
/// Positive when C lies to the left of the directed segment A->B.
#[inline]
#[must_use]
pub fn cross(a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Squared Euclidean distance between two points.
#[inline]
#[must_use]
pub fn distance_squared(a: Vector2<f64>, b: Vector2<f64>) -> f64 {
    let d = b - a;
    d.x * d.x + d.y * d.y
}

/// Rotates a point counter-clockwise by an angle in degrees about the origin.
#[inline]
#[must_use]
pub fn rotate_deg(point: Vector2<f64>, degrees: f64) -> Vector2<f64> {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vector2::new(point.x * cos - point.y * sin, point.x * sin + point.y * cos)
}

/// Computes the convex hull of a point set using the Graham scan.
///
/// The anchor is the lowest (then leftmost) point; remaining points are
/// sorted by polar angle around it, ties broken by distance. The result is
/// a simple convex polygon in counter-clockwise order. Interior and
/// collinear points are discarded.
#[must_use]
pub fn convex_hull(points: &[Vector2<f64>]) -> Vec<Vector2<f64>> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut sorted = points.to_vec();
    let anchor = *sorted
        .iter()
        .min_by(|a, b| (a.y, a.x).partial_cmp(&(b.y, b.x)).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(&sorted[0]);

    sorted.sort_by(|&a, &b| {
        let c = cross(anchor, a, b);
        if c == 0.0 {
            distance_squared(anchor, a)
                .partial_cmp(&distance_squared(anchor, b))
                .unwrap_or(std::cmp::Ordering::Equal)
        } else if c > 0.0 {
            std::cmp::Ordering::Less
        } else {
            std::cmp::Ordering::Greater
        }
    });

    let mut hull: Vec<Vector2<f64>> = Vec::with_capacity(sorted.len());
    for &p in &sorted {
        // pop while the last two hull points and p make a non-left turn
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }

    hull
}

/// Tests whether a point lies inside (or on the boundary of) a convex
/// polygon given in counter-clockwise order.
///
/// The `tolerance` relaxes the edge test so points within that distance
/// of the boundary still count as inside.
#[must_use]
pub fn point_in_convex_polygon(
    point: Vector2<f64>,
    polygon: &[Vector2<f64>],
    tolerance: f64,
) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    for i in 0..polygon.len() {
        let v1 = polygon[i];
        let v2 = polygon[(i + 1) % polygon.len()];

        let edge_len = distance_squared(v1, v2).sqrt();
        // cross / |edge| is the signed distance of the point to the edge line
        if cross(v1, v2, point) < -tolerance * edge_len {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cross_sign() {
        let a = Vector2::new(0.0, 0.0);
        let b = Vector2::new(1.0, 0.0);
        assert!(cross(a, b, Vector2::new(0.5, 1.0)) > 0.0);
        assert!(cross(a, b, Vector2::new(0.5, -1.0)) < 0.0);
        assert_relative_eq!(cross(a, b, Vector2::new(2.0, 0.0)), 0.0);
    }

    #[test]
    fn test_rotate_deg_quarter_turn() {
        let p = rotate_deg(Vector2::new(1.0, 0.0), 90.0);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hull_square_with_interior_point() {
        let points = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(0.5, 0.5),
        ];
        let hull = convex_hull(&points);
        assert_eq!(hull.len(), 4);
        // every input point lies on or inside the hull
        for &p in &points {
            assert!(point_in_convex_polygon(p, &hull, 1e-9));
        }
    }

    #[test]
    fn test_hull_is_convex_ccw() {
        let points = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(3.0, 1.0),
            Vector2::new(4.0, 4.0),
            Vector2::new(1.0, 3.0),
            Vector2::new(2.0, 2.0),
            Vector2::new(3.0, 2.0),
        ];
        let hull = convex_hull(&points);
        assert!(hull.len() >= 3);
        for i in 0..hull.len() {
            let a = hull[i];
            let b = hull[(i + 1) % hull.len()];
            let c = hull[(i + 2) % hull.len()];
            assert!(cross(a, b, c) > 0.0, "non-left turn at hull vertex {}", i);
        }
    }

    #[test]
    fn test_point_in_polygon_boundary_tolerance() {
        let square = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(10.0, 0.0),
            Vector2::new(10.0, 10.0),
            Vector2::new(0.0, 10.0),
        ];
        assert!(point_in_convex_polygon(Vector2::new(5.0, 5.0), &square, 1e-6));
        assert!(point_in_convex_polygon(Vector2::new(0.0, 0.0), &square, 1e-6));
        assert!(point_in_convex_polygon(Vector2::new(10.0, 5.0), &square, 1e-6));
        assert!(!point_in_convex_polygon(Vector2::new(10.1, 5.0), &square, 1e-6));
        assert!(!point_in_convex_polygon(Vector2::new(-0.1, 5.0), &square, 1e-6));
    }

    #[test]
    fn test_triangle_containment() {
        let tri = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(10.0, 0.0),
            Vector2::new(0.0, 10.0),
        ];
        assert!(point_in_convex_polygon(Vector2::new(2.0, 2.0), &tri, 1e-6));
        assert!(!point_in_convex_polygon(Vector2::new(6.0, 6.0), &tri, 1e-6));
    }
}
