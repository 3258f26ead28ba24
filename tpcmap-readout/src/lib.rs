//! Readout geometry model: planes, modules, channels and their lookups.
//!
//! The hierarchy runs plane, module, channel, pixel. A [`Readout`] resolves
//! 3D positions to the daq channel collecting charge there and back again,
//! after applying a daq-id decoding. Regular modules index their channels
//! through a uniform grid; [`ExperimentalModule`] covers free-form pixel
//! layouts with a hull plus KD-tree index.

pub mod drift;
pub mod error;
pub mod experimental;
pub mod module;
pub mod plane;
pub mod readout;

pub use drift::{DriftMedium, GasMedium};
pub use error::{Error, Result};
pub use experimental::{ExperimentalModule, ExperimentalPixel};
pub use module::ReadoutModule;
pub use plane::ReadoutPlane;
pub use readout::{ChannelLocation, Readout, ReadoutHit};
