//! Command-line interface for readout geometries.
//!
//! Loads a geometry description (or a built snapshot), validates it and
//! answers forward/inverse channel lookups from the shell.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nalgebra::Vector3;
use rayon::prelude::*;
use thiserror::Error;

use tpcmap_io::{load_snapshot, save_snapshot, ReadoutDescription};
use tpcmap_readout::Readout;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Description error: {0}")]
    TpcmapIo(#[from] tpcmap_io::Error),

    #[error("Readout error: {0}")]
    Readout(#[from] tpcmap_readout::Error),

    #[error("Geometry error: {0}")]
    Core(#[from] tpcmap_core::Error),
}

/// Readout geometry inspector for position-sensitive TPC detectors.
#[derive(Parser)]
#[command(name = "tpcmap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a geometry description and report warnings
    Validate {
        /// Geometry description (JSON)
        description: PathBuf,
    },

    /// Forward lookup: which channel collects charge at a 3D position
    Query {
        /// Geometry description or snapshot (JSON)
        geometry: PathBuf,

        #[arg(short, long)]
        x: f64,

        #[arg(short, long)]
        y: f64,

        #[arg(short, long)]
        z: f64,

        /// Scan all planes and fail on overlapping definitions
        #[arg(long)]
        check: bool,

        /// Treat the geometry file as a built snapshot
        #[arg(long)]
        snapshot: bool,
    },

    /// Inverse lookup: where a daq channel sits
    Locate {
        /// Geometry description or snapshot (JSON)
        geometry: PathBuf,

        /// Daq channel number
        #[arg(short, long)]
        daq: i32,

        /// Treat the geometry file as a built snapshot
        #[arg(long)]
        snapshot: bool,
    },

    /// Build a description and export the readout snapshot
    Export {
        /// Geometry description (JSON)
        description: PathBuf,

        /// Snapshot output path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Per-module grid mapping statistics
    MapStats {
        /// Geometry description or snapshot (JSON)
        geometry: PathBuf,

        /// Sample points per module axis for the lookup coverage check
        #[arg(long, default_value = "100")]
        samples: usize,

        /// Treat the geometry file as a built snapshot
        #[arg(long)]
        snapshot: bool,
    },
}

fn load_readout(path: &PathBuf, snapshot: bool) -> Result<Readout> {
    if snapshot {
        Ok(load_snapshot(path)?)
    } else {
        let description = ReadoutDescription::from_path(path)?;
        let (readout, report) = description.build()?;
        for warning in report.warnings() {
            eprintln!("warning: {:?}", warning);
        }
        Ok(readout)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { description } => {
            let description = ReadoutDescription::from_path(&description)?;
            let (readout, report) = description.build()?;

            println!("readout: {}", readout.name());
            println!("planes: {}", readout.plane_count());
            println!("modules: {}", readout.total_modules());
            println!("channels: {}", readout.total_channels());

            if report.is_clean() {
                println!("no warnings");
            } else {
                println!("{} warning(s):", report.warnings().len());
                for warning in report.warnings() {
                    println!("  {:?}", warning);
                }
            }
        }

        Commands::Query {
            geometry,
            x,
            y,
            z,
            check,
            snapshot,
        } => {
            let readout = load_readout(&geometry, snapshot)?;
            match readout.hit_at_position(Vector3::new(x, y, z), check)? {
                Some(hit) => {
                    println!("plane: {}", hit.plane_id);
                    println!("module: {}", hit.module_id);
                    println!("channel: {}", hit.channel_id);
                    println!("daq: {}", hit.daq_id);
                }
                None => println!("no channel at ({}, {}, {})", x, y, z),
            }
        }

        Commands::Locate {
            geometry,
            daq,
            snapshot,
        } => {
            let readout = load_readout(&geometry, snapshot)?;
            let located = readout.locate_daq_id(daq).and_then(|loc| {
                let plane = readout.plane(loc.plane_index)?;
                let module = plane.module(loc.module_index)?;
                Some((plane, module, loc.channel_index))
            });
            match located {
                Some((plane, module, channel)) => {
                    println!("plane: {}", plane.id());
                    println!("module: {}", module.id());
                    println!("channel: {}", channel);
                    let x = readout.x_of_daq_id(daq);
                    let y = readout.y_of_daq_id(daq);
                    println!(
                        "x: {}",
                        if x.is_nan() { "strip".to_string() } else { format!("{x:.3}") }
                    );
                    println!(
                        "y: {}",
                        if y.is_nan() { "strip".to_string() } else { format!("{y:.3}") }
                    );
                }
                None => println!("daq id {} not assigned", daq),
            }
        }

        Commands::Export {
            description,
            output,
        } => {
            let description = ReadoutDescription::from_path(&description)?;
            let (readout, report) = description.build()?;
            for warning in report.warnings() {
                eprintln!("warning: {:?}", warning);
            }
            save_snapshot(&readout, &output)?;
            println!("snapshot written to {}", output.display());
        }

        Commands::MapStats {
            geometry,
            samples,
            snapshot,
        } => {
            let readout = load_readout(&geometry, snapshot)?;
            for plane in readout.planes() {
                for module in plane.modules() {
                    let Some(mapping) = module.mapping() else {
                        println!(
                            "plane {} module {}: no mapping built",
                            plane.id(),
                            module.id()
                        );
                        continue;
                    };

                    let total = mapping.total_nodes();
                    let unset = mapping.unset_count();
                    let fill = 100.0 * (total - unset) as f64 / total as f64;

                    // sample the module surface and count failed lookups
                    let size = module.size();
                    let samples = samples.max(2);
                    let misses: usize = (0..samples)
                        .into_par_iter()
                        .map(|i| {
                            let mut misses = 0usize;
                            for j in 0..samples {
                                let local = nalgebra::Vector2::new(
                                    size.x * (i as f64 + 0.5) / samples as f64,
                                    size.y * (j as f64 + 0.5) / samples as f64,
                                );
                                let p = module.to_plane_coords(local);
                                if module.find_channel(p).is_none() {
                                    misses += 1;
                                }
                            }
                            misses
                        })
                        .sum();

                    println!(
                        "plane {} module {}: {}x{} nodes, {:.1}% filled, {} unset, \
                         {}/{} sample lookups missed",
                        plane.id(),
                        module.id(),
                        mapping.nodes_x(),
                        mapping.nodes_y(),
                        fill,
                        unset,
                        misses,
                        samples * samples
                    );
                }
            }
        }
    }

    Ok(())
}
