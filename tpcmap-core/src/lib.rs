//! tpcmap-core: Core geometry types for detector readout mapping.
//!
//! This crate provides the leaf types of the readout hierarchy: convex
//! pixels, readout channels, 2D geometry primitives, error types and
//! structured build diagnostics.

pub mod channel;
pub mod diagnostics;
pub mod error;
pub mod geom;
pub mod pixel;

pub use channel::{Channel, ChannelKind, DAQ_DISABLED, DAQ_UNASSIGNED};
pub use diagnostics::{BuildReport, BuildWarning};
pub use error::{Error, Result};
pub use pixel::{Pixel, PIXEL_TOLERANCE};
