//! Readout-level error types.

use thiserror::Error;

/// Result type for readout operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Readout-level error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Readout plane index out of range.
    #[error("readout plane index {index} out of range ({count} planes defined)")]
    PlaneIndexOutOfRange {
        /// Index requested.
        index: usize,
        /// Number of planes defined.
        count: usize,
    },

    /// Core geometry error.
    #[error("core error: {0}")]
    CoreError(#[from] tpcmap_core::Error),
}
