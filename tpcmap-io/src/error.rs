//! Error types for tpcmap-io.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for description and decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading descriptions, decodings or snapshots.
#[derive(Error, Debug)]
pub enum Error {
    /// File could not be read or written.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Geometry construction failed.
    #[error("geometry error: {0}")]
    Core(#[from] tpcmap_core::Error),

    /// Readout-level lookup or construction failed.
    #[error("readout error: {0}")]
    Readout(#[from] tpcmap_readout::Error),

    /// Description or snapshot JSON was malformed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A decoding file line did not hold two integer columns.
    #[error("malformed decoding line {line} in {path:?}: {content:?}")]
    MalformedDecodingLine {
        /// Path of the decoding file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// Offending line content.
        content: String,
    },
}
