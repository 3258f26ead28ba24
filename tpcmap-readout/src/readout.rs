//! Top-level readout aggregate: planes, global lookups and daq decoding.
//!
//! The readout answers both directions of the mapping question: which
//! (plane, module, channel, daq id) collects charge deposited at a 3D
//! position, and where in space a given daq channel sits. It also applies
//! and validates the daq-id decoding across all planes.

use std::collections::{HashMap, HashSet};

use nalgebra::Vector3;
use tpcmap_core::{ChannelKind, Error as CoreError, DAQ_DISABLED};

use crate::error::{Error, Result};
use crate::plane::ReadoutPlane;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The resolved owner of a 3D position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReadoutHit {
    pub plane_id: i32,
    pub module_id: i32,
    pub channel_id: i32,
    pub daq_id: i32,
}

/// Location of a daq id inside the readout hierarchy, by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelLocation {
    pub plane_index: usize,
    pub module_index: usize,
    pub channel_index: usize,
}

/// An ordered collection of readout planes.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Readout {
    name: String,
    planes: Vec<ReadoutPlane>,
}

impl Readout {
    /// Creates an empty readout.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            planes: Vec::new(),
        }
    }

    /// Readout name from the description.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of planes.
    #[inline]
    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Bounds-checked plane access by index.
    #[must_use]
    pub fn plane(&self, index: usize) -> Option<&ReadoutPlane> {
        self.planes.get(index)
    }

    pub fn plane_mut(&mut self, index: usize) -> Option<&mut ReadoutPlane> {
        self.planes.get_mut(index)
    }

    /// Iterates over the planes.
    pub fn planes(&self) -> impl Iterator<Item = &ReadoutPlane> {
        self.planes.iter()
    }

    pub fn planes_mut(&mut self) -> impl Iterator<Item = &mut ReadoutPlane> {
        self.planes.iter_mut()
    }

    /// Looks a plane up by its readout id.
    #[must_use]
    pub fn plane_by_id(&self, id: i32) -> Option<&ReadoutPlane> {
        self.planes.iter().find(|p| p.id() == id)
    }

    pub fn add_plane(&mut self, plane: ReadoutPlane) {
        self.planes.push(plane);
    }

    /// Total modules over all planes.
    #[must_use]
    pub fn total_modules(&self) -> usize {
        self.planes.iter().map(ReadoutPlane::module_count).sum()
    }

    /// Total channels over all planes.
    #[must_use]
    pub fn total_channels(&self) -> usize {
        self.planes.iter().map(ReadoutPlane::total_channels).sum()
    }

    // ---- position to channel -----------------------------------------

    /// Resolves a 3D position against one plane.
    ///
    /// `None` when the position misses the plane's drift slab or falls on
    /// dead area. Fails only on an out-of-range plane index.
    pub fn hit_at_plane(
        &self,
        position: Vector3<f64>,
        plane_index: usize,
    ) -> Result<Option<ReadoutHit>> {
        let plane = self
            .planes
            .get(plane_index)
            .ok_or(Error::PlaneIndexOutOfRange {
                index: plane_index,
                count: self.planes.len(),
            })?;

        let Some(module_index) = plane.module_from_position(position) else {
            return Ok(None);
        };
        let p = plane.position_in_plane(position);
        let Some(channel_index) = plane.find_channel(module_index, p) else {
            return Ok(None);
        };

        // indices validated above
        let module = match plane.module(module_index) {
            Some(m) => m,
            None => return Ok(None),
        };
        let channel = match module.channel(channel_index) {
            Some(c) => c,
            None => return Ok(None),
        };

        Ok(Some(ReadoutHit {
            plane_id: plane.id(),
            module_id: module.id(),
            channel_id: channel.id(),
            daq_id: channel.daq_id(),
        }))
    }

    /// Resolves a 3D position against every plane.
    ///
    /// With `check` set, all planes are scanned and a match from more than
    /// one plane fails the lookup, since that means the plane definitions
    /// overlap in space. Without it the first match wins.
    pub fn hit_at_position(
        &self,
        position: Vector3<f64>,
        check: bool,
    ) -> Result<Option<ReadoutHit>> {
        let mut found: Option<(usize, ReadoutHit)> = None;
        for plane_index in 0..self.planes.len() {
            if let Some(hit) = self.hit_at_plane(position, plane_index)? {
                if let Some((first_index, _)) = found {
                    let first_id = self.planes[first_index].id();
                    return Err(CoreError::OverlappingPlanes(first_id, hit.plane_id).into());
                }
                found = Some((plane_index, hit));
                if !check {
                    break;
                }
            }
        }
        Ok(found.map(|(_, hit)| hit))
    }

    // ---- daq id to channel -------------------------------------------

    /// Finds where a daq id lives, using the per-module daq ranges as a
    /// filter before the exact scan.
    #[must_use]
    pub fn locate_daq_id(&self, daq_id: i32) -> Option<ChannelLocation> {
        for (plane_index, plane) in self.planes.iter().enumerate() {
            for (module_index, module) in plane.modules().enumerate() {
                if !module.is_daq_id_inside(daq_id) {
                    continue;
                }
                if let Some(channel_index) = module.daq_to_readout_channel(daq_id) {
                    return Some(ChannelLocation {
                        plane_index,
                        module_index,
                        channel_index,
                    });
                }
            }
        }
        None
    }

    /// X coordinate in the owning plane's frame of a daq channel, or NaN.
    #[must_use]
    pub fn x_of_daq_id(&self, daq_id: i32) -> f64 {
        match self.locate_daq_id(daq_id) {
            Some(loc) => {
                let plane = &self.planes[loc.plane_index];
                let module_id = plane.module(loc.module_index).map_or(-1, |m| m.id());
                plane.x_of_channel(module_id, loc.channel_index)
            }
            None => f64::NAN,
        }
    }

    /// Y coordinate in the owning plane's frame of a daq channel, or NaN.
    #[must_use]
    pub fn y_of_daq_id(&self, daq_id: i32) -> f64 {
        match self.locate_daq_id(daq_id) {
            Some(loc) => {
                let plane = &self.planes[loc.plane_index];
                let module_id = plane.module(loc.module_index).map_or(-1, |m| m.id());
                plane.y_of_channel(module_id, loc.channel_index)
            }
            None => f64::NAN,
        }
    }

    /// X coordinate in a plane's frame of a channel addressed by readout
    /// ids, or NaN.
    #[must_use]
    pub fn x_of(&self, plane_id: i32, module_id: i32, channel: usize) -> f64 {
        self.plane_by_id(plane_id)
            .map_or(f64::NAN, |p| p.x_of_channel(module_id, channel))
    }

    /// Y coordinate in a plane's frame of a channel addressed by readout
    /// ids, or NaN.
    #[must_use]
    pub fn y_of(&self, plane_id: i32, module_id: i32, channel: usize) -> f64 {
        self.plane_by_id(plane_id)
            .map_or(f64::NAN, |p| p.y_of_channel(module_id, channel))
    }

    /// Type tag of the channel owning a daq id.
    #[must_use]
    pub fn channel_kind_of_daq_id(&self, daq_id: i32) -> Option<&ChannelKind> {
        let loc = self.locate_daq_id(daq_id)?;
        self.planes
            .get(loc.plane_index)?
            .module(loc.module_index)?
            .channel(loc.channel_index)
            .map(tpcmap_core::Channel::kind)
    }

    // ---- decoding ----------------------------------------------------

    /// Validates global daq-id uniqueness over assigned channels.
    ///
    /// Unassigned and disabled sentinels are exempt; any other daq id may
    /// appear only once across the whole readout, since the inverse
    /// lookups return the first match.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for plane in &self.planes {
            for module in plane.modules() {
                for channel in module.channels() {
                    let daq = channel.daq_id();
                    if daq < 0 {
                        continue;
                    }
                    if !seen.insert(daq) {
                        return Err(CoreError::DuplicateDaqId(daq).into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Rebases the daq ids of each listed module onto a new offset.
    ///
    /// Every assigned daq id in a listed module becomes
    /// `daq - min_daq + offset`, so the remap is relative to the module's
    /// pre-remap minimum and applying it twice is a no-op. With
    /// `ignore_undefined`, modules absent from `offsets` have all their
    /// channels set to [`DAQ_DISABLED`] so later lookups skip them. Daq
    /// ranges are refreshed afterwards.
    pub fn apply_channel_switching(
        &mut self,
        offsets: &HashMap<i32, i32>,
        ignore_undefined: bool,
    ) {
        for plane in &mut self.planes {
            for module in plane.modules_mut() {
                match offsets.get(&module.id()) {
                    Some(&offset) => {
                        let min = module.min_daq_id();
                        if min < 0 {
                            continue;
                        }
                        for channel in module.channels_mut() {
                            let daq = channel.daq_id();
                            if daq >= 0 {
                                channel.set_daq_id(daq - min + offset);
                            }
                        }
                    }
                    None if ignore_undefined => {
                        log::info!(
                            "module {} absent from the channel switching map, disabling",
                            module.id()
                        );
                        for channel in module.channels_mut() {
                            channel.set_daq_id(DAQ_DISABLED);
                        }
                    }
                    None => {}
                }
                module.set_min_max_daq_ids();
            }
        }
    }
}
