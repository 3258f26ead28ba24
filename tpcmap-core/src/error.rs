//! Error types for tpcmap-core.

use thiserror::Error;

/// Result type alias for tpcmap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for readout geometry construction.
#[derive(Error, Debug)]
pub enum Error {
    /// Pixel defined with fewer than three non-collinear vertices.
    #[error("degenerate pixel: {0} effective vertices, need at least 3")]
    DegeneratePixel(usize),

    /// Explicit id list does not form a dense 0..N-1 set.
    #[error("inconsistent {entity} id list: found id {given}, expected {expected}")]
    InconsistentIdList {
        /// Entity kind ("channel" or "pixel").
        entity: &'static str,
        /// Explicit id found.
        given: usize,
        /// Id expected from the element's position.
        expected: usize,
    },

    /// A plane referenced a module template that was never defined.
    #[error("unknown module template: {0}")]
    UnknownModuleTemplate(String),

    /// More than one plane claimed the same 3D point in checked mode.
    #[error("overlapping planes: point claimed by planes {0} and {1}")]
    OverlappingPlanes(i32, i32),

    /// Decoding table size does not match the module channel count.
    #[error("decoding mismatch: table has {table} entries, module has {channels} channels")]
    DecodingMismatch {
        /// Entries found in the decoding table.
        table: usize,
        /// Channels defined in the module.
        channels: usize,
    },

    /// The same daq id is assigned to more than one channel in the readout.
    #[error("duplicate daq id {0} across the readout")]
    DuplicateDaqId(i32),

    /// Plane normal vector is degenerate or axes are not orthonormal.
    #[error("invalid plane frame: {0}")]
    InvalidPlaneFrame(String),

    /// Drift height must be non-negative.
    #[error("invalid drift height: {0}")]
    InvalidHeight(f64),

    /// Generic configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
