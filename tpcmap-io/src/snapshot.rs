//! Readout snapshots: the built aggregate, serialized whole.
//!
//! A snapshot captures the fully built readout including applied decodings
//! and grid mappings, so downstream processes can load it without the
//! description or the decoding files being present.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tpcmap_readout::Readout;

use crate::error::Result;

/// Writes a readout to a JSON snapshot file.
pub fn save_snapshot(readout: &Readout, path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), readout)?;
    Ok(())
}

/// Reads a readout back from a JSON snapshot file.
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Readout> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::ReadoutDescription;
    use nalgebra::Vector3;

    #[test]
    fn test_snapshot_round_trip() {
        let json = r#"{
            "name": "snap",
            "mapping_nodes": 6,
            "module_templates": [
                {
                    "name": "pair",
                    "size": [20.0, 10.0],
                    "channels": [
                        { "pixels": [ { "origin": [0.0, 0.0], "size": [10.0, 10.0] } ] },
                        { "pixels": [ { "origin": [10.0, 0.0], "size": [10.0, 10.0] } ] }
                    ]
                }
            ],
            "planes": [
                { "height": 40.0, "modules": [ { "template": "pair", "id": 0 } ] }
            ]
        }"#;
        let (readout, _) = ReadoutDescription::from_json(json)
            .unwrap()
            .build()
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readout.json");
        save_snapshot(&readout, &path).unwrap();
        let loaded = load_snapshot(&path).unwrap();

        assert_eq!(loaded, readout);

        // the loaded readout keeps its mapping and answers queries
        let hit = loaded
            .hit_at_position(Vector3::new(15.0, 5.0, 20.0), true)
            .unwrap()
            .expect("inside module");
        assert_eq!(hit.channel_id, 1);
    }
}
