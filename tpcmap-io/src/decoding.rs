//! Decoding files: the daq-to-readout channel relation.
//!
//! A decoding file is plain text with two whitespace-separated integer
//! columns per line, daq channel number first, physical readout channel id
//! second. A negative readout id marks a daq channel left unconnected and
//! is skipped. Without a decoding file the relation is one to one.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tpcmap_core::Error as CoreError;
use tpcmap_readout::ReadoutModule;

use crate::error::{Error, Result};

/// A parsed decoding table, connected channels only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodingTable {
    entries: Vec<DecodingEntry>,
}

/// One connected (daq, readout) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodingEntry {
    pub daq: i32,
    pub readout: i32,
}

impl DecodingTable {
    /// Parses a decoding file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// Parses a decoding table from any buffered reader.
    ///
    /// `path` only labels parse errors. Blank lines are ignored; any other
    /// line must hold exactly two integers.
    pub fn from_reader(reader: impl BufRead, path: &Path) -> Result<Self> {
        let mut entries = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let mut columns = trimmed.split_whitespace();
            let parsed = (
                columns.next().and_then(|c| c.parse::<i32>().ok()),
                columns.next().and_then(|c| c.parse::<i32>().ok()),
                columns.next(),
            );
            let (Some(daq), Some(readout), None) = parsed else {
                return Err(Error::MalformedDecodingLine {
                    path: path.to_path_buf(),
                    line: index + 1,
                    content: trimmed.to_string(),
                });
            };

            // unconnected daq channel
            if readout < 0 {
                continue;
            }
            entries.push(DecodingEntry { daq, readout });
        }

        Ok(Self { entries })
    }

    /// Number of connected entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no connected entry was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The connected entries in file order.
    #[must_use]
    pub fn entries(&self) -> &[DecodingEntry] {
        &self.entries
    }

    /// Rewrites the daq ids of a module from this table.
    ///
    /// Every connected entry must name a valid readout channel and the
    /// entry count must equal the module channel count, otherwise the
    /// decoding does not describe this module and the build fails. Daq
    /// values are shifted by `first_daq_channel` before assignment.
    pub fn apply(&self, module: &mut ReadoutModule, first_daq_channel: i32) -> Result<()> {
        let channels = module.channel_count();
        if self.entries.len() != channels {
            return Err(CoreError::DecodingMismatch {
                table: self.entries.len(),
                channels,
            }
            .into());
        }

        for entry in &self.entries {
            let index = usize::try_from(entry.readout).map_err(|_| CoreError::DecodingMismatch {
                table: self.entries.len(),
                channels,
            })?;
            let channel = module
                .channel_mut(index)
                .ok_or(CoreError::DecodingMismatch {
                    table: self.entries.len(),
                    channels,
                })?;
            channel.set_daq_id(entry.daq + first_daq_channel);
            channel.set_id(entry.readout);
        }

        module.set_decoding_applied(true);
        module.set_min_max_daq_ids();
        Ok(())
    }
}

/// One-to-one decoding used when no file is given.
///
/// Channel `i` gets daq id `i + first_daq_channel`.
pub fn apply_identity_decoding(module: &mut ReadoutModule, first_daq_channel: i32) {
    for (index, channel) in module.channels_mut().enumerate() {
        let id = i32::try_from(index).unwrap_or(i32::MAX);
        channel.set_daq_id(id + first_daq_channel);
        channel.set_id(id);
    }
    module.set_decoding_applied(false);
    module.set_min_max_daq_ids();
}
