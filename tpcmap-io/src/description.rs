//! Readout geometry descriptions.
//!
//! A description is the JSON document a detector geometry is written in:
//! named module templates (size, channels, pixels) plus planes that place
//! instances of those templates and name their decoding files. Building a
//! description instantiates the templates, applies the decodings, builds
//! every grid mapping and validates daq uniqueness.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use tpcmap_core::{
    BuildReport, BuildWarning, Channel, ChannelKind, Error as CoreError, Pixel,
};
use tpcmap_readout::{Readout, ReadoutModule, ReadoutPlane};

use crate::decoding::{apply_identity_decoding, DecodingTable};
use crate::error::Result;

/// A pixel in a channel description.
///
/// Either `vertices` is given explicitly, or the pixel is an axis-aligned
/// description of `origin` plus `size` with an optional rotation about the
/// origin; the `triangle` flag then cuts the rectangle to the right
/// triangle anchored at the origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelDescription {
    #[serde(default)]
    pub origin: Option<Vector2<f64>>,
    #[serde(default)]
    pub size: Option<Vector2<f64>>,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub triangle: bool,
    #[serde(default)]
    pub vertices: Option<Vec<Vector2<f64>>>,
}

impl PixelDescription {
    fn build(&self) -> Result<Pixel> {
        if let Some(vertices) = &self.vertices {
            return Ok(Pixel::from_vertices(vertices)?);
        }
        let (Some(origin), Some(size)) = (self.origin, self.size) else {
            return Err(CoreError::ConfigError(
                "pixel needs either vertices or origin and size".into(),
            )
            .into());
        };
        let pixel = if self.triangle {
            Pixel::triangle(origin, size, self.rotation)?
        } else {
            Pixel::rectangle(origin, size, self.rotation)?
        };
        Ok(pixel)
    }
}

/// A channel in a module template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDescription {
    /// Physical readout channel id; when given it must equal the channel's
    /// position in the list.
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub name: Option<String>,
    /// Type tag, e.g. "veto".
    #[serde(default)]
    pub kind: Option<String>,
    pub pixels: Vec<PixelDescription>,
}

/// A named module geometry reused by plane placements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleTemplate {
    pub name: String,
    pub size: Vector2<f64>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    pub channels: Vec<ChannelDescription>,
}

fn default_tolerance() -> f64 {
    1e-3
}

/// Placement of a template instance inside a plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulePlacement {
    pub template: String,
    pub id: i32,
    #[serde(default)]
    pub origin: Vector2<f64>,
    #[serde(default)]
    pub rotation: f64,
    /// Offset added to every daq value of the decoding. `-1` continues
    /// after the channels added so far, for repetitive connection patterns.
    #[serde(default)]
    pub first_daq_channel: i32,
    #[serde(default)]
    pub decoding_file: Option<PathBuf>,
}

/// A plane and the modules placed on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaneDescription {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub position: Vector3<f64>,
    #[serde(default = "default_normal")]
    pub normal: Vector3<f64>,
    #[serde(default)]
    pub rotation: f64,
    /// Far end of the drift volume; sets the height as the distance to it.
    #[serde(default)]
    pub cathode_position: Option<Vector3<f64>>,
    /// Explicit drift height, overridden by `cathode_position`.
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default = "default_charge_collection")]
    pub charge_collection: f64,
    pub modules: Vec<ModulePlacement>,
}

fn default_normal() -> Vector3<f64> {
    Vector3::z()
}

fn default_charge_collection() -> f64 {
    1.0
}

/// The whole geometry document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadoutDescription {
    pub name: String,
    /// Grid nodes per module axis; 0 lets the build pick a heuristic.
    #[serde(default)]
    pub mapping_nodes: usize,
    pub module_templates: Vec<ModuleTemplate>,
    pub planes: Vec<PlaneDescription>,
}

impl ReadoutDescription {
    /// Loads a description from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Parses a description from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Instantiates the description into a queryable readout.
    ///
    /// Missing decoding files degrade to identity decoding with a warning;
    /// a decoding that does not match its module, an unknown template or a
    /// duplicate daq id across the readout are build failures.
    pub fn build(&self) -> Result<(Readout, BuildReport)> {
        let mut readout = Readout::new(self.name.clone());
        let mut report = BuildReport::new();
        let mut added_channels = 0i32;

        for (plane_index, plane_desc) in self.planes.iter().enumerate() {
            let id = plane_desc
                .id
                .unwrap_or(i32::try_from(plane_index).unwrap_or(i32::MAX));
            let mut plane = ReadoutPlane::new(id);
            plane.set_position(plane_desc.position);
            plane.set_normal(plane_desc.normal)?;
            plane.set_rotation(plane_desc.rotation)?;
            plane.set_charge_collection(plane_desc.charge_collection);

            let height = match plane_desc.cathode_position {
                Some(cathode) => (cathode - plane_desc.position).norm(),
                None => plane_desc.height.unwrap_or(0.0),
            };
            plane.set_height(height)?;

            for placement in &plane_desc.modules {
                let mut module = self.instantiate_template(placement, &mut report)?;

                let first_daq = if placement.first_daq_channel == -1 {
                    added_channels
                } else {
                    placement.first_daq_channel
                };
                self.apply_decoding(placement, &mut module, first_daq, &mut report)?;
                added_channels +=
                    i32::try_from(module.channel_count()).unwrap_or(i32::MAX);

                report.merge(module.build_mapping(self.mapping_nodes));
                plane.add_module(module);
            }

            readout.add_plane(plane);
        }

        readout.validate()?;
        Ok((readout, report))
    }

    fn instantiate_template(
        &self,
        placement: &ModulePlacement,
        report: &mut BuildReport,
    ) -> Result<ReadoutModule> {
        let template = self
            .module_templates
            .iter()
            .find(|t| t.name == placement.template)
            .ok_or_else(|| CoreError::UnknownModuleTemplate(placement.template.clone()))?;

        let mut module = ReadoutModule::new(placement.id, template.size)
            .with_name(template.name.clone())
            .with_tolerance(template.tolerance)
            .with_origin(placement.origin)
            .with_rotation(placement.rotation)
            .with_first_daq_channel(placement.first_daq_channel);

        for (index, ch_desc) in template.channels.iter().enumerate() {
            let expected = i32::try_from(index).unwrap_or(i32::MAX);
            let id = match ch_desc.id {
                Some(given) if given != expected => {
                    return Err(CoreError::InconsistentIdList {
                        entity: "channel",
                        given: usize::try_from(given).unwrap_or(usize::MAX),
                        expected: index,
                    }
                    .into());
                }
                _ => expected,
            };

            let pixels: Vec<Pixel> = ch_desc
                .pixels
                .iter()
                .map(PixelDescription::build)
                .collect::<Result<_>>()?;

            let mut channel = Channel::new(id, pixels);
            if let Some(name) = &ch_desc.name {
                channel = channel.with_name(name.clone());
            }
            if let Some(kind) = &ch_desc.kind {
                channel = channel.with_kind(ChannelKind::from_tag(kind));
            }
            module.add_channel(channel, report);
        }

        Ok(module)
    }

    fn apply_decoding(
        &self,
        placement: &ModulePlacement,
        module: &mut ReadoutModule,
        first_daq: i32,
        report: &mut BuildReport,
    ) -> Result<()> {
        match &placement.decoding_file {
            Some(path) if path.exists() => {
                let table = DecodingTable::from_path(path)?;
                table.apply(module, first_daq)?;
            }
            Some(path) => {
                report.warn(BuildWarning::MissingDecodingFile {
                    path: path.display().to_string(),
                });
                apply_identity_decoding(module, first_daq);
            }
            None => apply_identity_decoding(module, first_daq),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3 as V3;

    const DESCRIPTION: &str = r#"{
        "name": "prototype",
        "mapping_nodes": 8,
        "module_templates": [
            {
                "name": "quad",
                "size": [20.0, 20.0],
                "channels": [
                    { "id": 0, "pixels": [ { "origin": [0.0, 0.0], "size": [10.0, 10.0] } ] },
                    { "id": 1, "pixels": [ { "origin": [10.0, 0.0], "size": [10.0, 10.0] } ] },
                    { "id": 2, "kind": "veto",
                      "pixels": [ { "origin": [0.0, 10.0], "size": [10.0, 10.0] } ] },
                    { "id": 3, "pixels": [ { "origin": [10.0, 10.0], "size": [10.0, 10.0] } ] }
                ]
            }
        ],
        "planes": [
            {
                "position": [0.0, 0.0, 0.0],
                "cathode_position": [0.0, 0.0, 100.0],
                "modules": [
                    { "template": "quad", "id": 0 },
                    { "template": "quad", "id": 1, "origin": [20.0, 0.0],
                      "first_daq_channel": -1 }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_build_from_json() {
        let description = ReadoutDescription::from_json(DESCRIPTION).unwrap();
        let (readout, report) = description.build().unwrap();
        assert!(report.is_clean());

        let plane = readout.plane(0).unwrap();
        assert_eq!(plane.module_count(), 2);
        assert_relative_eq!(plane.height(), 100.0, epsilon = 1e-12);

        // identity decoding on module 0, sequential continuation on module 1
        let second = plane.module(1).unwrap();
        assert_eq!(second.channel(0).unwrap().daq_id(), 4);
        assert_eq!(second.channel(3).unwrap().daq_id(), 7);

        // the veto tag survives instantiation
        let veto = plane.module(0).unwrap().channel(2).unwrap();
        assert_eq!(*veto.kind(), ChannelKind::Veto);
    }

    #[test]
    fn test_built_readout_answers_queries() {
        let description = ReadoutDescription::from_json(DESCRIPTION).unwrap();
        let (readout, _) = description.build().unwrap();

        // (25, 15) is local (5, 15) of the second module: its channel 2
        let hit = readout
            .hit_at_position(V3::new(25.0, 15.0, 50.0), true)
            .unwrap()
            .expect("inside second module");
        assert_eq!(hit.module_id, 1);
        assert_eq!(hit.channel_id, 2);
        assert_eq!(hit.daq_id, 6);
    }

    #[test]
    fn test_unknown_template_rejected() {
        let mut description = ReadoutDescription::from_json(DESCRIPTION).unwrap();
        description.planes[0].modules[0].template = "missing".into();
        assert!(description.build().is_err());
    }

    #[test]
    fn test_non_dense_channel_ids_rejected() {
        let mut description = ReadoutDescription::from_json(DESCRIPTION).unwrap();
        description.module_templates[0].channels[1].id = Some(5);
        assert!(description.build().is_err());
    }

    #[test]
    fn test_missing_decoding_file_degrades_with_warning() {
        let mut description = ReadoutDescription::from_json(DESCRIPTION).unwrap();
        description.planes[0].modules[0].decoding_file =
            Some(PathBuf::from("/nonexistent/module.dec"));
        // daq ids collide with the identity decoding of module 1, so give
        // the second module its own range
        description.planes[0].modules[1].first_daq_channel = 100;

        let (_, report) = description.build().unwrap();
        assert!(report
            .warnings()
            .iter()
            .any(|w| matches!(w, BuildWarning::MissingDecodingFile { .. })));
    }

    #[test]
    fn test_decoding_file_applied() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.dec");
        let mut file = File::create(&path).unwrap();
        write!(file, "67 0\n65 1\n63 2\n61 3\n").unwrap();

        let mut description = ReadoutDescription::from_json(DESCRIPTION).unwrap();
        description.planes[0].modules[0].decoding_file = Some(path);
        description.planes[0].modules[1].first_daq_channel = 100;

        let (readout, _) = description.build().unwrap();
        let module = readout.plane(0).unwrap().module(0).unwrap();
        assert!(module.decoding_applied());
        assert_eq!(module.channel(1).unwrap().daq_id(), 65);
        assert_eq!(readout.locate_daq_id(61).unwrap().channel_index, 3);
    }

    #[test]
    fn test_duplicate_daq_across_modules_rejected() {
        let mut description = ReadoutDescription::from_json(DESCRIPTION).unwrap();
        // both modules get the identity decoding starting at 0
        description.planes[0].modules[1].first_daq_channel = 0;
        assert!(description.build().is_err());
    }

    #[test]
    fn test_triangle_and_vertex_pixels() {
        let json = r#"{
            "name": "shapes",
            "module_templates": [
                {
                    "name": "mixed",
                    "size": [10.0, 10.0],
                    "channels": [
                        { "pixels": [ { "origin": [0.0, 0.0], "size": [10.0, 5.0],
                                        "triangle": true } ] },
                        { "pixels": [ { "vertices": [[0.0, 5.0], [10.0, 5.0],
                                        [10.0, 10.0], [0.0, 10.0]] } ] }
                    ]
                }
            ],
            "planes": [
                { "height": 50.0, "modules": [ { "template": "mixed", "id": 0 } ] }
            ]
        }"#;
        let (readout, _) = ReadoutDescription::from_json(json)
            .unwrap()
            .build()
            .unwrap();
        let module = readout.plane(0).unwrap().module(0).unwrap();
        assert!(module.is_inside_channel(0, nalgebra::Vector2::new(1.0, 1.0)));
        assert!(!module.is_inside_channel(0, nalgebra::Vector2::new(9.0, 4.5)));
        assert!(module.is_inside_channel(1, nalgebra::Vector2::new(5.0, 7.0)));
    }
}
