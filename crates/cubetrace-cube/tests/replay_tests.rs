use cubetrace_cube::{
    CubeError, DataCube, DelayedVector, DryRunTracer, GeometryInput, HasBounds, LoadParameters, PassThroughProcess,
    VirtualCube,
};
use cubetrace_lineage::{ConstraintSet, SourceKey, TemporalExtent};
use cubetrace_test_utils::{
    bbox, feature_collection, geojson_file, geojson_input, load_s2, single_chain, square, two_band_branches,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn s2_key() -> SourceKey {
    SourceKey::new("load_collection", &json!(["S2"]))
}

fn merged(tracer: &DryRunTracer) -> Vec<(SourceKey, ConstraintSet)> {
    let constraints = tracer.source_constraints(true).unwrap();
    constraints
        .as_merged()
        .unwrap()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Generic evaluator fragment: works for any cube implementation.
fn ndvi_fragment<C: DataCube>(cube: &C) -> Result<C, C::Error> {
    let cube = cube.filter_bands(&["B04", "B08"])?;
    Ok(cube.pass_through(PassThroughProcess::Ndvi))
}

#[test]
fn test_single_chain() {
    let tracer = DryRunTracer::default();
    single_chain(&tracer);

    assert_eq!(
        merged(&tracer),
        vec![(
            s2_key(),
            ConstraintSet {
                temporal_extent: Some(TemporalExtent::between("2020-01-01", "2020-02-01")),
                spatial_extent: Some(bbox(0.0, 0.0, 1.0, 1.0)),
                bands: None,
            }
        )]
    );
}

#[test]
fn test_two_branches_union_bands() {
    let tracer = DryRunTracer::default();
    let cube = two_band_branches(&tracer);
    assert_eq!(cube.lineage().len(), 2);

    let result = merged(&tracer);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].0, s2_key());
    assert_eq!(
        result[0].1.bands,
        Some(vec!["B2".to_string(), "B3".into(), "B4".into()])
    );
}

#[test]
fn test_unmerged_keeps_leaves_apart() {
    let tracer = DryRunTracer::default();
    two_band_branches(&tracer);

    let constraints = tracer.source_constraints(false).unwrap();
    let per_leaf = constraints.as_per_leaf().unwrap();
    assert_eq!(per_leaf.len(), 1);
    let histories = &per_leaf[&s2_key()];
    assert_eq!(histories.len(), 2);
    assert_eq!(histories[0].bands, vec![vec!["B2".to_string(), "B3".into()]]);
    assert_eq!(histories[1].bands, vec![vec!["B3".to_string(), "B4".into()]]);
}

#[test]
fn test_replay_on_fresh_tracer_is_isomorphic() {
    let first = DryRunTracer::default();
    let second = DryRunTracer::default();
    let a = single_chain(&first);
    let b = single_chain(&second);

    assert_ne!(first.session(), second.session());
    assert_ne!(a.lineage(), b.lineage());
    assert_eq!(merged(&first), merged(&second));
}

#[test]
fn test_pass_through_does_not_change_constraints() {
    let with = DryRunTracer::default();
    let without = DryRunTracer::default();

    let cube = load_s2(&with).apply_process("resample_spatial").unwrap();
    cube.filter_bands(&["B2"]).unwrap();
    load_s2(&without).filter_bands(&["B2"]).unwrap();

    assert_eq!(merged(&with), merged(&without));
}

#[test]
fn test_mask_fans_out_over_both_sources() {
    let tracer = DryRunTracer::default();
    let s2 = load_s2(&tracer);
    let s1 = tracer
        .load_collection("S1", &LoadParameters::default().with_bands(["VV"]), None)
        .unwrap();

    let masked = s2.mask(&s1).unwrap();
    let nodes_before = tracer.node_count();
    masked.filter_temporal("2021-05-01", "2021-06-01").unwrap();
    assert_eq!(tracer.node_count(), nodes_before + 2);

    let result = merged(&tracer);
    assert_eq!(result.len(), 2);
    for (_, set) in &result {
        assert_eq!(
            set.temporal_extent,
            Some(TemporalExtent::between("2021-05-01", "2021-06-01"))
        );
    }
    assert_eq!(result[1].1.bands, Some(vec!["VV".to_string()]));
}

#[test]
fn test_aggregate_on_merged_cube_constrains_every_source() {
    let tracer = DryRunTracer::default();
    let mut cube = two_band_branches(&tracer);
    let regions = geojson_input(feature_collection(&[(2.0, 40.0, 1.0), (5.0, 41.0, 0.5)]));

    let result = cube.aggregate_spatial(regions, "mean").unwrap();
    assert!(result.timeseries().is_empty());
    assert_eq!(cube.lineage().len(), 2);

    let (_, set) = &merged(&tracer)[0];
    assert_eq!(set.spatial_extent, Some(bbox(2.0, 40.0, 5.5, 41.5)));
}

#[test]
fn test_aggregate_with_parsed_geometry() {
    let tracer = DryRunTracer::default();
    let mut cube = load_s2(&tracer);
    cube.aggregate_spatial(square(10.0, 20.0, 2.0).into(), "median")
        .unwrap();

    let (_, set) = &merged(&tracer)[0];
    assert_eq!(set.spatial_extent, Some(bbox(10.0, 20.0, 12.0, 22.0)));
}

#[test]
fn test_delayed_vector_is_read_once() {
    let (dir, path) = geojson_file(&feature_collection(&[(0.0, 0.0, 3.0)]));
    let vector = DelayedVector::from_path(path.clone());
    assert!(!vector.is_loaded());

    let tracer = DryRunTracer::default();
    let mut cube = load_s2(&tracer);
    cube.zonal_statistics(vector.clone().into(), "mean").unwrap();
    assert!(vector.is_loaded());

    // The file is gone; the memoized extent is still served.
    drop(dir);
    assert_eq!(vector.bounds().unwrap(), (0.0, 0.0, 3.0, 3.0));
}

#[test]
fn test_vector_path_from_process_argument() {
    let (_dir, path) = geojson_file(&feature_collection(&[(1.0, 1.0, 1.0)]));
    let regions = GeometryInput::from_value(json!(path.display().to_string())).unwrap();

    let tracer = DryRunTracer::default();
    let mut cube = load_s2(&tracer);
    let result = cube.aggregate_spatial(regions, "sum").unwrap();
    assert_eq!(result.regions().kind(), "delayed_vector");
}

#[test]
fn test_unsupported_geometry_is_user_error() {
    let err = GeometryInput::from_value(json!(3.5)).unwrap_err();
    assert!(matches!(err, CubeError::InvalidGeometry(_)));
    assert!(err.is_user_error());

    let tracer = DryRunTracer::default();
    let mut cube = load_s2(&tracer);
    let missing = DelayedVector::from_path("/nonexistent/cubetrace/fields.geojson");
    let err = cube.aggregate_spatial(missing.into(), "mean").unwrap_err();
    assert!(err.is_user_error());
    assert_eq!(tracer.node_count(), 1);
}

#[test]
fn test_generic_evaluator_fragment() {
    let tracer = DryRunTracer::default();
    let cube: VirtualCube = ndvi_fragment(&load_s2(&tracer)).unwrap();
    assert_eq!(cube.lineage().len(), 1);

    let (_, set) = &merged(&tracer)[0];
    assert_eq!(set.bands, Some(vec!["B04".to_string(), "B08".into()]));
}

#[test]
fn test_default_tracer_rejects_unset_crs_against_utm() {
    let tracer = DryRunTracer::default();
    let degrees = load_s2(&tracer).filter_spatial(0.0, 0.0, 1.0, 1.0, None).unwrap();
    let metres = load_s2(&tracer)
        .filter_spatial(500_000.0, 5_000_000.0, 510_000.0, 5_010_000.0, Some("EPSG:32631"))
        .unwrap();
    degrees.merge_cubes(&metres).unwrap();

    let err = tracer.source_constraints(true).unwrap_err();
    assert!(matches!(err, cubetrace_lineage::TraceError::CrsMismatch { .. }));
}

#[test]
fn test_temporal_spellings_union_across_branches() {
    for (early, late) in [
        ("2020-01-01 10:00:00", "2020-01-01 12:00:00"),
        ("2020-01-01T10:00:00.000+0000", "2020-01-01T12:00:00.000+0000"),
        ("2020-01-01T10:00Z", "2020-01-01T12:00Z"),
        ("2020-01", "2020-02"),
    ] {
        let tracer = DryRunTracer::default();
        load_s2(&tracer).filter_temporal(early, early).unwrap();
        load_s2(&tracer).filter_temporal(late, late).unwrap();

        let (_, set) = &merged(&tracer)[0];
        assert_eq!(set.temporal_extent, Some(TemporalExtent::between(early, late)));
    }
}
