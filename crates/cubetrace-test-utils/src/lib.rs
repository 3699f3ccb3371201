//! Testing utilities for cubetrace workspace
//!
//! Shared scenario builders and fixtures.

#![allow(missing_docs)]

use cubetrace_cube::{DataCube, DryRunTracer, GeometryInput, VirtualCube};
use cubetrace_lineage::BoundingBox;
use geo_types::{polygon, Geometry};
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;

pub const WGS84: &str = "EPSG:4326";

pub fn bbox(west: f64, south: f64, east: f64, north: f64) -> BoundingBox {
    BoundingBox::new(west, south, east, north).with_crs(WGS84)
}

pub fn load_s2(tracer: &DryRunTracer) -> VirtualCube {
    tracer.load_collection("S2", &Default::default(), None).unwrap()
}

/// `load_collection(S2)`, temporal filter on January 2020, then the unit box
pub fn single_chain(tracer: &DryRunTracer) -> VirtualCube {
    load_s2(tracer)
        .filter_temporal("2020-01-01", "2020-02-01")
        .unwrap()
        .filter_spatial(0.0, 0.0, 1.0, 1.0, Some(WGS84))
        .unwrap()
}

/// Two S2 branches filtered to `[B2, B3]` and `[B3, B4]`, merged
pub fn two_band_branches(tracer: &DryRunTracer) -> VirtualCube {
    let left = load_s2(tracer).filter_bands(&["B2", "B3"]).unwrap();
    let right = load_s2(tracer).filter_bands(&["B3", "B4"]).unwrap();
    left.merge_cubes(&right).unwrap()
}

pub fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
    polygon![
        (x: x, y: y),
        (x: x + size, y: y),
        (x: x + size, y: y + size),
        (x: x, y: y + size),
        (x: x, y: y),
    ]
    .into()
}

pub fn feature_collection(squares: &[(f64, f64, f64)]) -> Value {
    let features: Vec<Value> = squares
        .iter()
        .map(|&(x, y, size)| {
            json!({
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[x, y], [x + size, y], [x + size, y + size], [x, y + size], [x, y]]]
                }
            })
        })
        .collect();
    json!({"type": "FeatureCollection", "features": features})
}

/// Vector file on disk; the directory lives as long as the returned guard
pub fn geojson_file(value: &Value) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("regions.geojson");
    std::fs::write(&path, serde_json::to_vec(value).unwrap()).unwrap();
    (dir, path)
}

pub fn geojson_input(value: Value) -> GeometryInput {
    GeometryInput::from_value(value).unwrap()
}
