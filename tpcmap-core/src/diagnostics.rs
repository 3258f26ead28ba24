//! Structured build diagnostics.
//!
//! Build operations (grid mapping, channel placement) return a
//! [`BuildReport`] instead of printing to the console; warnings are also
//! forwarded to the `log` facade so they remain visible to callers that
//! never inspect the report.

/// A single recoverable condition observed while building the readout.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildWarning {
    /// Two pixel centers mapped to the same grid node during the seeding
    /// pass. Corrected by the exhaustive pass; raising the node count
    /// makes it disappear.
    NodeAlreadySet {
        /// Claiming channel index.
        channel: usize,
        /// Claiming pixel index.
        pixel: usize,
        /// Channel index that seeded the node first.
        prev_channel: usize,
        /// Pixel index that seeded the node first.
        prev_pixel: usize,
        /// Grid node (x, y).
        node: (usize, usize),
    },

    /// A pixel falls outside the module bounding box beyond tolerance.
    PixelOutsideModule {
        /// Channel index inside the module.
        channel: usize,
        /// Pixel index inside the channel.
        pixel: usize,
    },

    /// Grid nodes left unset after the exhaustive pass (dead area).
    UnmappedNodes {
        /// Number of nodes not covered by any pixel.
        count: usize,
    },

    /// A decoding file was requested but could not be read; identity
    /// decoding was applied instead.
    MissingDecodingFile {
        /// Path as given in the description.
        path: String,
    },
}

/// Warnings accumulated across one build operation.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    warnings: Vec<BuildWarning>,
}

impl BuildReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a warning and forwards it to the log facade.
    pub fn warn(&mut self, warning: BuildWarning) {
        log::warn!("{warning:?}");
        self.warnings.push(warning);
    }

    /// Absorbs another report.
    pub fn merge(&mut self, other: BuildReport) {
        self.warnings.extend(other.warnings);
    }

    /// Returns the recorded warnings.
    #[must_use]
    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    /// True when no warnings were recorded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
