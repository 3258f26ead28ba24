//! Readout module: a rectangular tile of channels with a precomputed
//! grid mapping.
//!
//! The module owns the central lookup algorithm of the readout: a uniform
//! grid seeded from pixel centers, completed by an exhaustive containment
//! pass, and queried through a nearest-node fast path with a bounded
//! spiral fallback around it.

use nalgebra::Vector2;
use rayon::prelude::*;
use tpcmap_core::geom::rotate_deg;
use tpcmap_core::{BuildReport, BuildWarning, Channel, DAQ_UNASSIGNED};
use tpcmap_algorithms::GridMapping;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A readout module placed at an origin/rotation inside a plane's 2D frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReadoutModule {
    id: i32,
    name: String,
    origin: Vector2<f64>,
    size: Vector2<f64>,
    rotation_deg: f64,
    tolerance: f64,
    first_daq_channel: i32,
    decoding_applied: bool,
    channels: Vec<Channel>,
    mapping: Option<GridMapping>,
    daq_range: (i32, i32),
}

impl ReadoutModule {
    /// Creates an empty module of the given size.
    #[must_use]
    pub fn new(id: i32, size: Vector2<f64>) -> Self {
        Self {
            id,
            name: String::new(),
            origin: Vector2::zeros(),
            size,
            rotation_deg: 0.0,
            tolerance: 1e-3,
            first_daq_channel: 0,
            decoding_applied: false,
            channels: Vec::new(),
            mapping: None,
            daq_range: (DAQ_UNASSIGNED, DAQ_UNASSIGNED),
        }
    }

    /// Sets the module name (template name in the description).
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the origin inside the plane frame.
    #[must_use]
    pub fn with_origin(mut self, origin: Vector2<f64>) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the rotation about the origin, in degrees.
    #[must_use]
    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation_deg = degrees;
        self
    }

    /// Sets the placement tolerance in mm.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the daq channel offset applied by the decoding.
    #[must_use]
    pub fn with_first_daq_channel(mut self, first: i32) -> Self {
        self.first_daq_channel = first;
        self
    }

    /// Module id as defined on the readout.
    #[inline]
    #[must_use]
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Rewrites the module id. Used while instantiating templates.
    pub fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    /// Module template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Origin inside the plane frame.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> Vector2<f64> {
        self.origin
    }

    /// Module size.
    #[inline]
    #[must_use]
    pub fn size(&self) -> Vector2<f64> {
        self.size
    }

    /// Rotation in degrees.
    #[inline]
    #[must_use]
    pub fn rotation_deg(&self) -> f64 {
        self.rotation_deg
    }

    /// Daq channel offset applied by the decoding.
    #[inline]
    #[must_use]
    pub fn first_daq_channel(&self) -> i32 {
        self.first_daq_channel
    }

    /// True once a decoding table rewrote the daq ids of this module.
    #[inline]
    #[must_use]
    pub fn decoding_applied(&self) -> bool {
        self.decoding_applied
    }

    pub fn set_decoding_applied(&mut self, applied: bool) {
        self.decoding_applied = applied;
    }

    /// Repositions the module inside the plane frame.
    pub fn set_placement(&mut self, origin: Vector2<f64>, rotation_deg: f64) {
        self.origin = origin;
        self.rotation_deg = rotation_deg;
    }

    // ---- channels ----------------------------------------------------

    /// Number of channels.
    #[inline]
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Bounds-checked channel access.
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    /// Mutable channel access, the seam used by decoding and remaps.
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut Channel> {
        self.channels.get_mut(index)
    }

    /// Iterates over the channels.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    /// Mutable iteration over the channels.
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.iter_mut()
    }

    /// Total number of pixels over all channels.
    #[must_use]
    pub fn total_pixels(&self) -> usize {
        self.channels.iter().map(Channel::pixel_count).sum()
    }

    /// Adds a channel, warning when any pixel exceeds the module bounding
    /// box beyond tolerance (soft invariant, never fatal).
    pub fn add_channel(&mut self, channel: Channel, report: &mut BuildReport) {
        let ch_index = self.channels.len();
        for (px_index, pixel) in channel.pixels().enumerate() {
            let outside = pixel.vertices().iter().any(|v| {
                v.x + self.tolerance < 0.0
                    || v.y + self.tolerance < 0.0
                    || v.x - self.tolerance > self.size.x
                    || v.y - self.tolerance > self.size.y
            });
            if outside {
                report.warn(BuildWarning::PixelOutsideModule {
                    channel: ch_index,
                    pixel: px_index,
                });
            }
        }
        self.channels.push(channel);
    }

    // ---- coordinate transforms ---------------------------------------

    /// Transforms a plane-frame point into module-local coordinates.
    #[inline]
    #[must_use]
    pub fn to_module_coords(&self, plane_point: Vector2<f64>) -> Vector2<f64> {
        rotate_deg(plane_point - self.origin, -self.rotation_deg)
    }

    /// Transforms a module-local point into the plane frame.
    #[inline]
    #[must_use]
    pub fn to_plane_coords(&self, module_point: Vector2<f64>) -> Vector2<f64> {
        rotate_deg(module_point, self.rotation_deg) + self.origin
    }

    /// Module corner `n` (0..3, counter-clockwise from the origin) in the
    /// plane frame.
    #[must_use]
    pub fn vertex(&self, n: usize) -> Vector2<f64> {
        let corner = match n % 4 {
            0 => Vector2::zeros(),
            1 => Vector2::new(self.size.x, 0.0),
            2 => self.size,
            _ => Vector2::new(0.0, self.size.y),
        };
        self.to_plane_coords(corner)
    }

    /// Pixel vertex in the plane frame.
    #[must_use]
    pub fn pixel_vertex(&self, channel: usize, pixel: usize, n: usize) -> Option<Vector2<f64>> {
        let pix = self.channels.get(channel)?.pixel(pixel)?;
        Some(self.to_plane_coords(pix.vertex(n)))
    }

    /// Pixel center in the plane frame.
    #[must_use]
    pub fn pixel_center(&self, channel: usize, pixel: usize) -> Option<Vector2<f64>> {
        let pix = self.channels.get(channel)?.pixel(pixel)?;
        Some(self.to_plane_coords(pix.center()))
    }

    // ---- containment -------------------------------------------------

    /// Axis-aligned bounding-box test in module-local space.
    #[must_use]
    pub fn is_inside(&self, plane_point: Vector2<f64>) -> bool {
        let p = self.to_module_coords(plane_point);
        p.x >= 0.0 && p.x <= self.size.x && p.y >= 0.0 && p.y <= self.size.y
    }

    /// Tests a plane-frame point against every pixel of one channel.
    #[must_use]
    pub fn is_inside_channel(&self, channel: usize, plane_point: Vector2<f64>) -> bool {
        let p = self.to_module_coords(plane_point);
        self.channels.get(channel).is_some_and(|ch| ch.contains(p))
    }

    /// Tests a plane-frame point against one specific pixel.
    #[must_use]
    pub fn is_inside_pixel(&self, channel: usize, pixel: usize, plane_point: Vector2<f64>) -> bool {
        let p = self.to_module_coords(plane_point);
        self.channels
            .get(channel)
            .and_then(|ch| ch.pixel(pixel))
            .is_some_and(|px| px.contains(p))
    }

    /// Shortest vector from a plane-frame point to the module border.
    ///
    /// Zero when the point is already inside.
    #[must_use]
    pub fn distance_to_module(&self, plane_point: Vector2<f64>) -> Vector2<f64> {
        let p = self.to_module_coords(plane_point);

        let dx = if p.x < 0.0 {
            -p.x
        } else if self.size.x - p.x < 0.0 {
            self.size.x - p.x
        } else {
            0.0
        };
        let dy = if p.y < 0.0 {
            -p.y
        } else if self.size.y - p.y < 0.0 {
            self.size.y - p.y
        } else {
            0.0
        };

        Vector2::new(dx, dy)
    }

    // ---- grid mapping ------------------------------------------------

    /// Returns the grid mapping, if built.
    #[must_use]
    pub fn mapping(&self) -> Option<&GridMapping> {
        self.mapping.as_ref()
    }

    /// Builds the grid mapping in two passes.
    ///
    /// With `nodes == 0` the resolution falls back to the
    /// `2 * sqrt(total_pixels)` heuristic. The seeding pass assigns each
    /// pixel center to its nearest node (first-writer-wins; collisions are
    /// warned and corrected by the next pass). The exhaustive pass then
    /// resolves every still-unset node by linear containment testing, in
    /// parallel. Nodes covered by no pixel at all (dead area) are reported,
    /// not rejected.
    pub fn build_mapping(&mut self, nodes: usize) -> BuildReport {
        let mut report = BuildReport::new();

        let total_pixels = self.total_pixels();
        let nodes = if nodes == 0 {
            (2.0 * (total_pixels as f64).sqrt()).round() as usize
        } else {
            nodes
        };

        let mut mapping = GridMapping::new(nodes, nodes, self.size.x, self.size.y);
        log::debug!(
            "module {}: mapping {} pixels onto {}x{} nodes",
            self.id,
            total_pixels,
            mapping.nodes_x(),
            mapping.nodes_y()
        );

        // Seeding pass: nearest node of every pixel center.
        for (ch, channel) in self.channels.iter().enumerate() {
            for (px, pixel) in channel.pixels().enumerate() {
                let center = pixel.center();
                let nx = mapping.node_x(center.x);
                let ny = mapping.node_y(center.y);

                if let Some((prev_ch, prev_px)) = mapping.get(nx, ny) {
                    report.warn(BuildWarning::NodeAlreadySet {
                        channel: ch,
                        pixel: px,
                        prev_channel: prev_ch,
                        prev_pixel: prev_px,
                        node: (nx, ny),
                    });
                } else {
                    mapping.set(nx, ny, ch, px);
                }
            }
        }

        // Exhaustive pass: resolve the remaining nodes by containment.
        let unset: Vec<(usize, usize)> = (0..mapping.nodes_x())
            .flat_map(|i| (0..mapping.nodes_y()).map(move |j| (i, j)))
            .filter(|&(i, j)| !mapping.is_set(i, j))
            .collect();

        let assignments: Vec<((usize, usize), Option<(usize, usize)>)> = unset
            .par_iter()
            .map(|&(i, j)| {
                let p = Vector2::new(mapping.x(i), mapping.y(j));
                let hit = self.channels.iter().enumerate().find_map(|(ch, channel)| {
                    channel
                        .pixels()
                        .position(|pixel| pixel.contains(p))
                        .map(|px| (ch, px))
                });
                ((i, j), hit)
            })
            .collect();

        for ((i, j), hit) in assignments {
            if let Some((ch, px)) = hit {
                mapping.set(i, j, ch, px);
            }
        }

        let dead = mapping.unset_count();
        if dead > 0 {
            report.warn(BuildWarning::UnmappedNodes { count: dead });
        }

        self.mapping = Some(mapping);
        report
    }

    // ---- point queries -----------------------------------------------

    /// Finds the channel containing a plane-frame point.
    ///
    /// Rejects points outside the module bounding box, then resolves
    /// through the grid mapping: nearest-node fast path first, then a
    /// bounded spiral walk over concentric node rings. The walk wraps
    /// toroidally and gives up after visiting 10% of all nodes, which is
    /// a non-fatal lookup failure.
    #[must_use]
    pub fn find_channel(&self, plane_point: Vector2<f64>) -> Option<usize> {
        if !self.is_inside(plane_point) {
            return None;
        }

        // Single-channel modules (veto tiles) skip the spatial search.
        if self.channels.len() == 1 {
            return Some(0);
        }

        let local = self.to_module_coords(plane_point);
        let Some(mapping) = &self.mapping else {
            return self.find_channel_linear(local);
        };

        let mut ix = mapping.node_x(local.x) as i64;
        let mut iy = mapping.node_y(local.y) as i64;

        let cap = (mapping.total_nodes() / 10).max(4);
        let mut steps = 0usize;

        // Spiral state: +x, -y, -x, +y legs, ring radius grows every half lap.
        let mut repeat = 1usize;
        let mut count = 0usize;
        let mut forward = true;
        let mut x_axis = true;

        loop {
            let nx = mapping.wrap_x(ix);
            let ny = mapping.wrap_y(iy);

            if let Some((ch, px)) = mapping.get(nx, ny) {
                let contained = self
                    .channels
                    .get(ch)
                    .and_then(|c| c.pixel(px))
                    .is_some_and(|pixel| pixel.contains(local));
                if contained {
                    return Some(ch);
                }
            }

            steps += 1;
            if steps > cap {
                log::warn!(
                    "module {}: no channel found for ({:.3}, {:.3}) in module coordinates \
                     after {} spiral steps",
                    self.id,
                    local.x,
                    local.y,
                    steps - 1
                );
                return None;
            }

            match (x_axis, forward) {
                (true, true) => ix += 1,
                (false, true) => iy += 1,
                (true, false) => ix -= 1,
                (false, false) => iy -= 1,
            }

            count += 1;
            if count >= repeat {
                (x_axis, forward) = match (x_axis, forward) {
                    (true, true) => (false, false),
                    (false, false) => {
                        repeat += 1;
                        (true, false)
                    }
                    (true, false) => (false, true),
                    (false, true) => {
                        repeat += 1;
                        (true, true)
                    }
                };
                count = 0;
            }
        }
    }

    /// Exact linear fallback used when no mapping has been built.
    fn find_channel_linear(&self, local: Vector2<f64>) -> Option<usize> {
        self.channels.iter().position(|ch| ch.contains(local))
    }

    // ---- daq bookkeeping ---------------------------------------------

    /// Recomputes the min/max daq id range over assigned channels.
    ///
    /// Unassigned and disabled sentinels are excluded so a remapped or
    /// partially decoded module keeps a meaningful range.
    pub fn set_min_max_daq_ids(&mut self) {
        let mut range: Option<(i32, i32)> = None;
        for ch in &self.channels {
            let daq = ch.daq_id();
            if daq < 0 {
                continue;
            }
            range = Some(match range {
                None => (daq, daq),
                Some((lo, hi)) => (lo.min(daq), hi.max(daq)),
            });
        }
        self.daq_range = range.unwrap_or((DAQ_UNASSIGNED, DAQ_UNASSIGNED));
    }

    /// Smallest assigned daq id.
    #[inline]
    #[must_use]
    pub fn min_daq_id(&self) -> i32 {
        self.daq_range.0
    }

    /// Largest assigned daq id.
    #[inline]
    #[must_use]
    pub fn max_daq_id(&self) -> i32 {
        self.daq_range.1
    }

    /// Cheap range test: is this daq id possibly owned by the module?
    #[must_use]
    pub fn is_daq_id_inside(&self, daq_id: i32) -> bool {
        self.daq_range.0 >= 0 && daq_id >= self.daq_range.0 && daq_id <= self.daq_range.1
    }

    /// Finds the channel index owning a daq id. Cold path, decoding only.
    #[must_use]
    pub fn daq_to_readout_channel(&self, daq_id: i32) -> Option<usize> {
        self.channels.iter().position(|ch| ch.daq_id() == daq_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tpcmap_core::Pixel;

    /// 2x2 channels of 10x10 pixels tiling a 20x20 module.
    fn quad_module() -> ReadoutModule {
        let mut module = ReadoutModule::new(0, Vector2::new(20.0, 20.0));
        let mut report = BuildReport::new();
        let mut id = 0;
        for iy in 0..2 {
            for ix in 0..2 {
                let origin = Vector2::new(f64::from(ix) * 10.0, f64::from(iy) * 10.0);
                let pixel = Pixel::rectangle(origin, Vector2::new(10.0, 10.0), 0.0).unwrap();
                module.add_channel(Channel::new(id, vec![pixel]), &mut report);
                id += 1;
            }
        }
        assert!(report.is_clean());
        module
    }

    #[test]
    fn test_coordinate_round_trip() {
        let module = ReadoutModule::new(0, Vector2::new(20.0, 20.0))
            .with_origin(Vector2::new(5.0, -3.0))
            .with_rotation(30.0);
        let p = Vector2::new(7.5, 2.5);
        let back = module.to_plane_coords(module.to_module_coords(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-12);
    }

    #[test]
    fn test_is_inside_rotated_module() {
        let module = ReadoutModule::new(0, Vector2::new(20.0, 10.0)).with_rotation(90.0);
        // after a 90 degree rotation the tile occupies x in [-10,0], y in [0,20]
        assert!(module.is_inside(Vector2::new(-5.0, 10.0)));
        assert!(!module.is_inside(Vector2::new(5.0, 5.0)));
    }

    #[test]
    fn test_mapping_grid_consistency() {
        let mut module = quad_module();
        let report = module.build_mapping(8);
        assert!(!report
            .warnings()
            .iter()
            .any(|w| matches!(w, BuildWarning::UnmappedNodes { .. })));

        let mapping = module.mapping().unwrap();
        for i in 0..mapping.nodes_x() {
            for j in 0..mapping.nodes_y() {
                let (ch, px) = mapping.get(i, j).expect("full coverage expected");
                let p = Vector2::new(mapping.x(i), mapping.y(j));
                assert!(
                    module.channel(ch).unwrap().pixel(px).unwrap().contains(p),
                    "node ({i},{j}) assignment does not contain its own position"
                );
            }
        }
    }

    #[test]
    fn test_find_channel_partition() {
        let mut module = quad_module();
        module.build_mapping(8);

        assert_eq!(module.find_channel(Vector2::new(5.0, 5.0)), Some(0));
        assert_eq!(module.find_channel(Vector2::new(15.0, 5.0)), Some(1));
        assert_eq!(module.find_channel(Vector2::new(5.0, 15.0)), Some(2));
        assert_eq!(module.find_channel(Vector2::new(15.0, 15.0)), Some(3));
        assert_eq!(module.find_channel(Vector2::new(25.0, 25.0)), None);

        // every interior point resolves to the channel that truly contains it
        for i in 0..20 {
            for j in 0..20 {
                let p = Vector2::new(f64::from(i) + 0.5, f64::from(j) + 0.5);
                let found = module.find_channel(p).expect("point inside module");
                assert!(module.is_inside_channel(found, p));
            }
        }
    }

    #[test]
    fn test_find_channel_without_mapping_falls_back() {
        let module = quad_module();
        assert_eq!(module.find_channel(Vector2::new(15.0, 15.0)), Some(3));
    }

    #[test]
    fn test_pixel_outside_module_is_warned_not_fatal() {
        let mut module = ReadoutModule::new(0, Vector2::new(10.0, 10.0));
        let mut report = BuildReport::new();
        let stray =
            Pixel::rectangle(Vector2::new(8.0, 8.0), Vector2::new(10.0, 10.0), 0.0).unwrap();
        module.add_channel(Channel::new(0, vec![stray]), &mut report);

        assert_eq!(module.channel_count(), 1);
        assert!(matches!(
            report.warnings()[0],
            BuildWarning::PixelOutsideModule { channel: 0, pixel: 0 }
        ));
    }

    #[test]
    fn test_daq_range_and_lookup() {
        let mut module = quad_module();
        for (i, ch) in module.channels_mut().enumerate() {
            ch.set_daq_id(100 + i as i32 * 2);
        }
        module.set_min_max_daq_ids();

        assert_eq!(module.min_daq_id(), 100);
        assert_eq!(module.max_daq_id(), 106);
        assert!(module.is_daq_id_inside(104));
        assert!(!module.is_daq_id_inside(99));
        assert_eq!(module.daq_to_readout_channel(104), Some(2));
        assert_eq!(module.daq_to_readout_channel(105), None);
    }

    #[test]
    fn test_distance_to_module() {
        let module = ReadoutModule::new(0, Vector2::new(10.0, 10.0));
        let d = module.distance_to_module(Vector2::new(-3.0, 12.0));
        assert_relative_eq!(d.x, 3.0);
        assert_relative_eq!(d.y, -2.0);
        let inside = module.distance_to_module(Vector2::new(5.0, 5.0));
        assert_relative_eq!(inside.norm(), 0.0);
    }

    #[test]
    fn test_module_vertices_rotated() {
        let module = ReadoutModule::new(0, Vector2::new(10.0, 20.0))
            .with_origin(Vector2::new(1.0, 1.0))
            .with_rotation(90.0);
        let v2 = module.vertex(2);
        assert_relative_eq!(v2.x, 1.0 - 20.0, epsilon = 1e-12);
        assert_relative_eq!(v2.y, 1.0 + 10.0, epsilon = 1e-12);
    }
}
