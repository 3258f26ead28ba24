//! Readout plane: an oriented 2D frame in 3D space holding modules.
//!
//! The plane anchors the detector-frame geometry. Its normal and in-plane
//! rotation define two orthonormal axes used to project 3D positions into
//! the 2D frame the modules live in, and its height bounds the drift slab
//! the plane collects charge from.

use nalgebra::{Rotation3, Unit, Vector2, Vector3};
use tpcmap_core::Error as CoreError;

use crate::error::Result;
use crate::module::ReadoutModule;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const AXIS_TOLERANCE: f64 = 1e-6;

/// A readout plane with its placement, drift slab and attached modules.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReadoutPlane {
    id: i32,
    position: Vector3<f64>,
    normal: Vector3<f64>,
    rotation_deg: f64,
    height: f64,
    charge_collection: f64,
    axis_x: Vector3<f64>,
    axis_y: Vector3<f64>,
    modules: Vec<ReadoutModule>,
}

impl Default for ReadoutPlane {
    fn default() -> Self {
        Self {
            id: -1,
            position: Vector3::zeros(),
            normal: Vector3::z(),
            rotation_deg: 0.0,
            height: 0.0,
            charge_collection: 1.0,
            axis_x: Vector3::x(),
            axis_y: Vector3::y(),
            modules: Vec::new(),
        }
    }
}

impl ReadoutPlane {
    /// Creates a plane at the origin with a +z normal.
    #[must_use]
    pub fn new(id: i32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Plane id as defined on the readout.
    #[inline]
    #[must_use]
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    /// Plane anchor position in the detector frame.
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn set_position(&mut self, position: Vector3<f64>) {
        self.position = position;
    }

    /// Unit normal of the plane.
    #[inline]
    #[must_use]
    pub fn normal(&self) -> Vector3<f64> {
        self.normal
    }

    /// Sets the plane normal (normalized) and recomputes the axes.
    pub fn set_normal(&mut self, normal: Vector3<f64>) -> Result<()> {
        let norm = normal.norm();
        if norm < AXIS_TOLERANCE {
            return Err(CoreError::InvalidPlaneFrame(
                "normal vector cannot be zero".into(),
            )
            .into());
        }
        self.normal = normal / norm;
        self.update_axes()
    }

    /// In-plane rotation in degrees. Recomputes the axes.
    pub fn set_rotation(&mut self, degrees: f64) -> Result<()> {
        self.rotation_deg = degrees;
        self.update_axes()
    }

    /// Rotation of the in-plane axes about the normal, in degrees.
    #[inline]
    #[must_use]
    pub fn rotation_deg(&self) -> f64 {
        self.rotation_deg
    }

    /// Drift slab height above the plane, in mm.
    #[inline]
    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Sets the drift slab height. Negative heights are rejected.
    pub fn set_height(&mut self, height: f64) -> Result<()> {
        if height < 0.0 {
            return Err(CoreError::InvalidHeight(height).into());
        }
        self.height = height;
        Ok(())
    }

    /// Relative charge collection efficiency of this plane.
    #[inline]
    #[must_use]
    pub fn charge_collection(&self) -> f64 {
        self.charge_collection
    }

    pub fn set_charge_collection(&mut self, fraction: f64) {
        self.charge_collection = fraction;
    }

    /// In-plane x axis in the detector frame.
    #[inline]
    #[must_use]
    pub fn axis_x(&self) -> Vector3<f64> {
        self.axis_x
    }

    /// In-plane y axis in the detector frame.
    #[inline]
    #[must_use]
    pub fn axis_y(&self) -> Vector3<f64> {
        self.axis_y
    }

    /// Cathode position: the far end of the drift slab.
    #[must_use]
    pub fn cathode_position(&self) -> Vector3<f64> {
        self.position + self.height * self.normal
    }

    /// Recomputes the in-plane axes from the normal and rotation.
    pub fn update_axes(&mut self) -> Result<()> {
        let (ax, ay) = frame_axes(self.normal, self.rotation_deg)?;
        self.axis_x = ax;
        self.axis_y = ay;
        Ok(())
    }

    // ---- projections -------------------------------------------------

    /// Signed distance from the plane along its normal.
    #[inline]
    #[must_use]
    pub fn distance_to(&self, position: Vector3<f64>) -> f64 {
        (position - self.position).dot(&self.normal)
    }

    /// Slab test: is the position within the drift volume of this plane?
    ///
    /// The plane surface itself belongs to the slab, the cathode does not.
    #[must_use]
    pub fn is_inside_drift_volume(&self, position: Vector3<f64>) -> bool {
        let d = self.distance_to(position);
        d >= 0.0 && d < self.height
    }

    /// Projects a detector-frame position into the plane's 2D frame.
    #[must_use]
    pub fn position_in_plane(&self, position: Vector3<f64>) -> Vector2<f64> {
        let rel = position - self.position;
        Vector2::new(rel.dot(&self.axis_x), rel.dot(&self.axis_y))
    }

    /// Lifts a plane-frame point back into the detector frame, on the
    /// plane surface.
    #[must_use]
    pub fn world_point(&self, plane_point: Vector2<f64>) -> Vector3<f64> {
        self.position + plane_point.x * self.axis_x + plane_point.y * self.axis_y
    }

    /// Lifts a plane-frame point into the detector frame at a drift
    /// distance above the plane surface.
    #[must_use]
    pub fn world_point_at(&self, plane_point: Vector2<f64>, drift: f64) -> Vector3<f64> {
        self.world_point(plane_point) + drift * self.normal
    }

    // ---- modules -----------------------------------------------------

    /// Number of modules on the plane.
    #[inline]
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Bounds-checked module access by index.
    #[must_use]
    pub fn module(&self, index: usize) -> Option<&ReadoutModule> {
        self.modules.get(index)
    }

    pub fn module_mut(&mut self, index: usize) -> Option<&mut ReadoutModule> {
        self.modules.get_mut(index)
    }

    /// Iterates over the modules.
    pub fn modules(&self) -> impl Iterator<Item = &ReadoutModule> {
        self.modules.iter()
    }

    pub fn modules_mut(&mut self) -> impl Iterator<Item = &mut ReadoutModule> {
        self.modules.iter_mut()
    }

    /// Looks a module up by its readout id.
    #[must_use]
    pub fn module_by_id(&self, id: i32) -> Option<&ReadoutModule> {
        self.modules.iter().find(|m| m.id() == id)
    }

    pub fn add_module(&mut self, module: ReadoutModule) {
        self.modules.push(module);
    }

    /// Total channels over all modules.
    #[must_use]
    pub fn total_channels(&self) -> usize {
        self.modules.iter().map(ReadoutModule::channel_count).sum()
    }

    /// True when any module on this plane owns the daq id.
    #[must_use]
    pub fn is_daq_id_inside(&self, daq_id: i32) -> bool {
        self.modules.iter().any(|m| m.is_daq_id_inside(daq_id))
    }

    /// Index of the module containing a detector-frame position, after the
    /// slab test.
    #[must_use]
    pub fn module_from_position(&self, position: Vector3<f64>) -> Option<usize> {
        if !self.is_inside_drift_volume(position) {
            return None;
        }
        let p = self.position_in_plane(position);
        self.modules.iter().position(|m| m.is_inside(p))
    }

    /// Readout id of the module containing a detector-frame position.
    #[must_use]
    pub fn module_id_from_position(&self, position: Vector3<f64>) -> Option<i32> {
        self.module_from_position(position)
            .and_then(|index| self.modules.get(index))
            .map(ReadoutModule::id)
    }

    /// Bounding corners of the plane in its own frame, over all module
    /// vertices. `None` when no module is placed.
    #[must_use]
    pub fn boundaries(&self) -> Option<(Vector2<f64>, Vector2<f64>)> {
        let mut bounds: Option<(Vector2<f64>, Vector2<f64>)> = None;
        for module in &self.modules {
            for n in 0..4 {
                let v = module.vertex(n);
                bounds = Some(match bounds {
                    None => (v, v),
                    Some((lo, hi)) => (
                        Vector2::new(lo.x.min(v.x), lo.y.min(v.y)),
                        Vector2::new(hi.x.max(v.x), hi.y.max(v.y)),
                    ),
                });
            }
        }
        bounds
    }

    /// Channel index for a plane-frame point inside a given module.
    #[must_use]
    pub fn find_channel(&self, module_index: usize, plane_point: Vector2<f64>) -> Option<usize> {
        self.modules.get(module_index)?.find_channel(plane_point)
    }

    // ---- strip coordinates -------------------------------------------

    /// X coordinate in the plane frame of a channel, by module id.
    ///
    /// A channel only localizes x when its pixels stack along y. NaN means
    /// the coordinate is not localized by this channel (a strip running
    /// along x). Single-pixel channels use the pixel aspect ratio, longer
    /// channels the direction between the first and last pixel centers,
    /// corrected for right-angle module rotations.
    #[must_use]
    pub fn x_of_channel(&self, module_id: i32, channel: usize) -> f64 {
        self.strip_coordinate(module_id, channel, StripAxis::X)
    }

    /// Y coordinate in the plane frame of a channel, by module id.
    ///
    /// NaN when the channel does not localize y. See [`Self::x_of_channel`].
    #[must_use]
    pub fn y_of_channel(&self, module_id: i32, channel: usize) -> f64 {
        self.strip_coordinate(module_id, channel, StripAxis::Y)
    }

    fn strip_coordinate(&self, module_id: i32, channel: usize, axis: StripAxis) -> f64 {
        let Some(module) = self.module_by_id(module_id) else {
            return f64::NAN;
        };
        let Some(ch) = module.channel(channel) else {
            return f64::NAN;
        };
        let module_index = self
            .modules
            .iter()
            .position(|m| m.id() == module_id)
            .unwrap_or(0);

        let pick = |p: Vector2<f64>| match axis {
            StripAxis::X => p.x,
            StripAxis::Y => p.y,
        };

        match ch.pixel_count() {
            0 => f64::NAN,
            1 => {
                let extent = match ch.pixel(0) {
                    Some(px) => px.extent(),
                    None => return f64::NAN,
                };
                // A strip elongated along the queried axis does not localize
                // it. The test runs on the module-local extent, so module
                // rotation does not enter the single-pixel path.
                let elongated = match axis {
                    StripAxis::X => extent.x >= 2.0 * extent.y,
                    StripAxis::Y => extent.y >= 2.0 * extent.x,
                };
                if elongated {
                    return f64::NAN;
                }
                self.pixel_coordinate(module_index, channel, 0, pick)
            }
            n => {
                let (Some(first), Some(last)) = (ch.pixel(0), ch.pixel(n - 1)) else {
                    return f64::NAN;
                };
                let delta = last.center() - first.center();
                let delta_x = delta.x.abs();
                let delta_y = delta.y.abs();

                // Channels laid out along y localize x and vice versa; a
                // right-angle module rotation swaps the roles.
                let rotation = module.rotation_deg().round() as i64;
                let localized = if rotation % 90 == 0 {
                    let swapped = (rotation / 90) % 2 != 0;
                    match (axis, swapped) {
                        (StripAxis::X, false) | (StripAxis::Y, true) => delta_y > delta_x,
                        (StripAxis::X, true) | (StripAxis::Y, false) => delta_y < delta_x,
                    }
                } else {
                    match axis {
                        StripAxis::X => delta_y > delta_x,
                        StripAxis::Y => delta_y < delta_x,
                    }
                };
                if localized {
                    self.pixel_coordinate(module_index, channel, 0, pick)
                } else {
                    f64::NAN
                }
            }
        }
    }

    fn pixel_coordinate(
        &self,
        module_index: usize,
        channel: usize,
        pixel: usize,
        pick: impl Fn(Vector2<f64>) -> f64,
    ) -> f64 {
        self.modules
            .get(module_index)
            .and_then(|m| m.pixel_center(channel, pixel))
            .map_or(f64::NAN, pick)
    }
}

#[derive(Clone, Copy)]
enum StripAxis {
    X,
    Y,
}

/// Derives the in-surface axes of any oriented surface from its unit
/// normal and spin.
///
/// The axes start as (1,0,0)/(0,1,0), are carried onto the surface by the
/// rotation taking +z into the normal (axis-angle, about their cross
/// product), then spun about the normal by `rotation_deg`. The antiparallel
/// normal is special-cased since the rotation axis degenerates there. Fails
/// if the resulting frame is not orthonormal.
pub(crate) fn frame_axes(
    normal: Vector3<f64>,
    rotation_deg: f64,
) -> Result<(Vector3<f64>, Vector3<f64>)> {
    let z = Vector3::z();

    let mut axis_x = Vector3::x();
    let mut axis_y = Vector3::y();

    if (normal - z).norm_squared() < AXIS_TOLERANCE {
        // already aligned
    } else if (normal + z).norm_squared() < AXIS_TOLERANCE {
        axis_x = Vector3::new(0.0, -1.0, 0.0);
        axis_y = Vector3::new(-1.0, 0.0, 0.0);
    } else {
        let axis = Unit::new_normalize(z.cross(&normal));
        let angle = z.dot(&normal).clamp(-1.0, 1.0).acos();
        let tilt = Rotation3::from_axis_angle(&axis, angle);
        axis_x = tilt * axis_x;
        axis_y = tilt * axis_y;
    }

    let spin = Rotation3::from_axis_angle(&Unit::new_normalize(normal), rotation_deg.to_radians());
    axis_x = spin * axis_x;
    axis_y = spin * axis_y;

    let orthonormal = (axis_x.norm() - 1.0).abs() < AXIS_TOLERANCE
        && (axis_y.norm() - 1.0).abs() < AXIS_TOLERANCE
        && axis_x.dot(&axis_y).abs() < AXIS_TOLERANCE
        && axis_x.dot(&normal).abs() < AXIS_TOLERANCE
        && axis_y.dot(&normal).abs() < AXIS_TOLERANCE
        && (axis_x.cross(&axis_y) - normal).norm() < AXIS_TOLERANCE;
    if !orthonormal {
        return Err(CoreError::InvalidPlaneFrame(format!(
            "axes are not orthonormal for normal ({:.6}, {:.6}, {:.6}), rotation {:.3} deg",
            normal.x, normal.y, normal.z, rotation_deg
        ))
        .into());
    }
    Ok((axis_x, axis_y))
}
