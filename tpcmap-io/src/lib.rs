//! Geometry descriptions, decoding files and snapshots.
//!
//! Input side: a JSON [`ReadoutDescription`] and per-module
//! [`DecodingTable`] files build a queryable readout. Output side:
//! [`save_snapshot`]/[`load_snapshot`] persist the built aggregate.

pub mod decoding;
pub mod description;
pub mod error;
pub mod snapshot;

pub use decoding::{apply_identity_decoding, DecodingEntry, DecodingTable};
pub use description::{
    ChannelDescription, ModulePlacement, ModuleTemplate, PixelDescription, PlaneDescription,
    ReadoutDescription,
};
pub use error::{Error, Result};
pub use snapshot::{load_snapshot, save_snapshot};
