//! End-to-end scenarios over the full plane/module/channel hierarchy.

use nalgebra::{Vector2, Vector3};
use tpcmap_core::{BuildReport, Channel, Pixel};
use tpcmap_readout::{Readout, ReadoutModule, ReadoutPlane};

/// A module of `n x n` single-pixel square channels of the given pitch,
/// with daq ids starting at `first_daq`.
fn pixel_module(id: i32, n: i32, pitch: f64, first_daq: i32) -> ReadoutModule {
    let mut module = ReadoutModule::new(id, Vector2::new(f64::from(n) * pitch, f64::from(n) * pitch));
    let mut report = BuildReport::new();
    for iy in 0..n {
        for ix in 0..n {
            let ch_id = iy * n + ix;
            let origin = Vector2::new(f64::from(ix) * pitch, f64::from(iy) * pitch);
            let pixel = Pixel::rectangle(origin, Vector2::new(pitch, pitch), 0.0).unwrap();
            let mut channel = Channel::new(ch_id, vec![pixel]);
            channel.set_daq_id(first_daq + ch_id);
            module.add_channel(channel, &mut report);
        }
    }
    assert!(report.is_clean());
    let report = module.build_mapping(0);
    assert!(report.is_clean());
    module.set_min_max_daq_ids();
    module
}

#[test]
fn test_single_channel_of_four_pixels() {
    // one channel made of a 2x2 arrangement of 10 mm pixels
    let mut module = ReadoutModule::new(0, Vector2::new(20.0, 20.0));
    let mut report = BuildReport::new();
    let pixels: Vec<Pixel> = (0..4)
        .map(|i| {
            let origin = Vector2::new(f64::from(i % 2) * 10.0, f64::from(i / 2) * 10.0);
            Pixel::rectangle(origin, Vector2::new(10.0, 10.0), 0.0).unwrap()
        })
        .collect();
    module.add_channel(Channel::new(0, pixels), &mut report);
    module.build_mapping(0);

    assert_eq!(module.find_channel(Vector2::new(5.0, 5.0)), Some(0));
    assert_eq!(module.find_channel(Vector2::new(15.0, 15.0)), Some(0));
    assert_eq!(module.find_channel(Vector2::new(25.0, 25.0)), None);
}

#[test]
fn test_two_plane_readout_resolves_by_slab() {
    let mut bottom = ReadoutPlane::new(0);
    bottom.set_height(100.0).unwrap();
    bottom.add_module(pixel_module(0, 4, 10.0, 0));

    let mut top = ReadoutPlane::new(1);
    top.set_position(Vector3::new(0.0, 0.0, 300.0));
    top.set_normal(Vector3::new(0.0, 0.0, -1.0)).unwrap();
    top.set_height(100.0).unwrap();
    // the flipped normal flips the in-plane axes, so the module tile must
    // cover negative plane coordinates to sit above the bottom one
    top.add_module(pixel_module(0, 4, 10.0, 100).with_origin(Vector2::new(-40.0, -40.0)));

    let mut readout = Readout::new("double");
    readout.add_plane(bottom);
    readout.add_plane(top);
    readout.validate().unwrap();

    let low = readout
        .hit_at_position(Vector3::new(5.0, 5.0, 50.0), true)
        .unwrap()
        .expect("inside bottom slab");
    assert_eq!(low.plane_id, 0);

    let high = readout
        .hit_at_position(Vector3::new(5.0, 5.0, 250.0), true)
        .unwrap()
        .expect("inside top slab");
    assert_eq!(high.plane_id, 1);

    // between the two slabs nothing collects
    assert!(readout
        .hit_at_position(Vector3::new(5.0, 5.0, 150.0), true)
        .unwrap()
        .is_none());
}

#[test]
fn test_position_daq_position_round_trip() {
    let mut plane = ReadoutPlane::new(0);
    plane.set_height(100.0).unwrap();
    plane.add_module(pixel_module(2, 4, 10.0, 40));

    let mut readout = Readout::new("single");
    readout.add_plane(plane);

    for ix in 0..4 {
        for iy in 0..4 {
            let center = Vector3::new(
                f64::from(ix) * 10.0 + 5.0,
                f64::from(iy) * 10.0 + 5.0,
                20.0,
            );
            let hit = readout
                .hit_at_position(center, true)
                .unwrap()
                .expect("pixel center inside module");
            assert_eq!(hit.channel_id, iy * 4 + ix);

            // square single-pixel channels localize both coordinates
            let x = readout.x_of_daq_id(hit.daq_id);
            let y = readout.y_of_daq_id(hit.daq_id);
            assert!((x - center.x).abs() < 1e-9);
            assert!((y - center.y).abs() < 1e-9);
        }
    }
}

#[test]
fn test_rotated_module_lookup_matches_local_frame() {
    let module = pixel_module(0, 4, 10.0, 0)
        .with_origin(Vector2::new(30.0, -10.0))
        .with_rotation(45.0);

    for ix in 0..4 {
        for iy in 0..4 {
            let local = Vector2::new(f64::from(ix) * 10.0 + 5.0, f64::from(iy) * 10.0 + 5.0);
            let plane_point = module.to_plane_coords(local);
            let found = module.find_channel(plane_point).expect("inside module");
            assert_eq!(found as i32, iy * 4 + ix);
        }
    }
}

#[test]
fn test_daq_lookup_after_channel_switching() {
    use std::collections::HashMap;

    let mut plane = ReadoutPlane::new(0);
    plane.set_height(100.0).unwrap();
    plane.add_module(pixel_module(5, 2, 10.0, 7));

    let mut readout = Readout::new("switched");
    readout.add_plane(plane);

    readout.apply_channel_switching(&HashMap::from([(5, 200)]), false);
    readout.validate().unwrap();

    let loc = readout.locate_daq_id(202).expect("remapped daq id");
    let channel = readout
        .plane(loc.plane_index)
        .unwrap()
        .module(loc.module_index)
        .unwrap()
        .channel(loc.channel_index)
        .unwrap();
    assert_eq!(channel.id(), 2);
    // the old ids no longer resolve
    assert!(readout.locate_daq_id(9).is_none());
}
