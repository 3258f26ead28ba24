//! KD-tree results must match a brute-force linear scan.
#![allow(clippy::uninlined_format_args)]

use nalgebra::Vector2;
use tpcmap_algorithms::KdTree2;

/// Deterministic xorshift generator so failures reproduce.
struct XorShift(u64);

impl XorShift {
    fn next_f64(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x >> 11) as f64 / f64::from(1u32 << 21) / f64::from(1u32 << 21) / 2048.0
    }

    fn point(&mut self, span: f64) -> Vector2<f64> {
        Vector2::new(self.next_f64() * span, self.next_f64() * span)
    }
}

fn brute_force(points: &[Vector2<f64>], query: Vector2<f64>, radius: f64) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| (*p - query).norm() <= radius)
        .map(|(i, _)| i)
        .collect()
}

#[test]
fn test_kdtree_equals_brute_force() {
    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);

    for &n in &[1usize, 7, 16, 100, 500] {
        let points: Vec<_> = (0..n).map(|_| rng.point(100.0)).collect();
        let tree = KdTree2::build(&points);

        for _ in 0..20 {
            let query = rng.point(100.0);
            let radius = 1.0 + rng.next_f64() * 20.0;

            let mut got = tree.query_radius(query, radius);
            got.sort_unstable();
            let expected = brute_force(&points, query, radius);

            assert_eq!(
                got, expected,
                "mismatch for n={}, query=({}, {}), r={}",
                n, query.x, query.y, radius
            );
        }
    }
}

#[test]
fn test_kdtree_duplicate_points() {
    let points = vec![Vector2::new(5.0, 5.0); 40];
    let tree = KdTree2::build(&points);

    let mut hits = tree.query_radius(Vector2::new(5.0, 5.0), 0.1);
    hits.sort_unstable();
    assert_eq!(hits, (0..40).collect::<Vec<_>>());
    assert!(tree.query_radius(Vector2::new(6.0, 5.0), 0.5).is_empty());
}
