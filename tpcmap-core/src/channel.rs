//! Readout channel: an ordered collection of pixels sharing one physical
//! channel id.

use crate::pixel::Pixel;
use nalgebra::Vector2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sentinel daq id for channels not yet assigned by any decoding.
pub const DAQ_UNASSIGNED: i32 = -1;

/// Sentinel daq id for channels disabled by a channel-switching remap
/// ("ignore undefined modules" policy).
pub const DAQ_DISABLED: i32 = -1_000_000_000;

/// Classification tag of a readout channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChannelKind {
    /// Regular position-sensitive channel.
    #[default]
    Standard,
    /// Veto channel, bypasses spatial search.
    Veto,
    /// Any other channel class, carried verbatim from the description.
    Other(String),
}

impl ChannelKind {
    /// Parses a kind tag from its description string.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "" | "standard" => Self::Standard,
            "veto" => Self::Veto,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A readout channel owning an ordered set of pixels.
///
/// The physical channel id is assigned at build time and never changes;
/// the daq id is the seam rewritten by decoding and remap operations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Channel {
    id: i32,
    daq_id: i32,
    name: String,
    kind: ChannelKind,
    pixels: Vec<Pixel>,
}

impl Channel {
    /// Creates a channel with its stable physical id and owned pixels.
    #[must_use]
    pub fn new(id: i32, pixels: Vec<Pixel>) -> Self {
        Self {
            id,
            daq_id: DAQ_UNASSIGNED,
            name: String::new(),
            kind: ChannelKind::Standard,
            pixels,
        }
    }

    /// Sets the channel name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the channel kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ChannelKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns the stable physical channel id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Rewrites the stable channel id. Used only while applying a decoding.
    pub fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    /// Returns the acquisition channel number.
    #[inline]
    #[must_use]
    pub fn daq_id(&self) -> i32 {
        self.daq_id
    }

    /// Rewrites the acquisition channel number.
    pub fn set_daq_id(&mut self, daq_id: i32) {
        self.daq_id = daq_id;
    }

    /// Returns the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the channel kind tag.
    #[must_use]
    pub fn kind(&self) -> &ChannelKind {
        &self.kind
    }

    /// Number of pixels in the channel.
    #[inline]
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Bounds-checked pixel access.
    #[must_use]
    pub fn pixel(&self, index: usize) -> Option<&Pixel> {
        self.pixels.get(index)
    }

    /// Iterates over the owned pixels.
    pub fn pixels(&self) -> impl Iterator<Item = &Pixel> {
        self.pixels.iter()
    }

    /// Tests whether a module-local point falls inside any owned pixel.
    #[must_use]
    pub fn contains(&self, point: Vector2<f64>) -> bool {
        self.pixels.iter().any(|p| p.contains(point))
    }
}
