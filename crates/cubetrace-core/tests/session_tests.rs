use cubetrace_core::{
    BoundingBox, DataCube, DryRunConfig, DryRunSession, LoadParameters, PolicyKind, TemporalExtent,
};
use cubetrace_test_utils::{feature_collection, geojson_input, load_s2, single_chain, two_band_branches};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_report_json_for_single_chain() {
    let session = DryRunSession::new(DryRunConfig::default());
    single_chain(session.tracer());
    let report = session.finish().unwrap();

    assert_eq!(report.nodes, 3);
    assert_eq!(report.leaves, 1);
    assert_eq!(
        report.to_json().unwrap()["constraints"],
        json!({
            "load_collection([\"S2\"])": {
                "temporal_extent": ["2020-01-01", "2020-02-01"],
                "spatial_extent": {"west": 0.0, "south": 0.0, "east": 1.0, "north": 1.0, "crs": "EPSG:4326"}
            }
        })
    );
}

#[test]
fn test_unmerged_report_lists_histories() {
    let session = DryRunSession::new(DryRunConfig::new().with_merge(false));
    two_band_branches(session.tracer());
    let json = session.finish().unwrap().to_json().unwrap();

    let histories = json["constraints"]["load_collection([\"S2\"])"].as_array().unwrap();
    assert_eq!(histories.len(), 2);
    assert_eq!(histories[0]["bands"], json!([["B2", "B3"]]));
    assert_eq!(histories[1]["bands"], json!([["B3", "B4"]]));
}

#[test]
fn test_intersect_policy_narrows_repeated_filters() {
    let session = DryRunSession::new(DryRunConfig::new().with_policy(PolicyKind::Intersect));
    load_s2(session.tracer())
        .filter_temporal("2020-01-01", "2020-12-31")
        .unwrap()
        .filter_temporal("2020-06-01", "2021-06-01")
        .unwrap();

    let report = session.finish().unwrap();
    let merged = report.constraints.as_merged().unwrap();
    let set = merged.values().next().unwrap();
    assert_eq!(
        set.temporal_extent,
        Some(TemporalExtent::between("2020-06-01", "2020-12-31"))
    );
}

#[test]
fn test_keep_first_ignores_later_filters() {
    let session = DryRunSession::new(DryRunConfig::default());
    load_s2(session.tracer())
        .filter_bands(&["B2", "B3", "B4"])
        .unwrap()
        .filter_bands(&["B4"])
        .unwrap();

    let report = session.finish().unwrap();
    let set = report.constraints.as_merged().unwrap().values().next().unwrap().clone();
    assert_eq!(set.bands, Some(vec!["B2".to_string(), "B3".into(), "B4".into()]));
}

#[test]
fn test_unset_crs_falls_back_to_default() {
    let session = DryRunSession::new(DryRunConfig::default());
    let tracer = session.tracer();
    let left = load_s2(tracer).filter_spatial(0.0, 0.0, 1.0, 1.0, None).unwrap();
    let right = load_s2(tracer)
        .filter_spatial(2.0, 2.0, 3.0, 3.0, Some("epsg:4326"))
        .unwrap();
    left.merge_cubes(&right).unwrap();

    let report = session.finish().unwrap();
    let set = report.constraints.as_merged().unwrap().values().next().unwrap().clone();
    assert_eq!(
        set.spatial_extent,
        Some(BoundingBox::new(0.0, 0.0, 3.0, 3.0).with_crs("EPSG:4326"))
    );
}

#[test]
fn test_crs_mismatch_aborts_session() {
    let session = DryRunSession::new(DryRunConfig::default());
    let tracer = session.tracer();
    load_s2(tracer)
        .filter_spatial(0.0, 0.0, 1.0, 1.0, Some("EPSG:4326"))
        .unwrap();
    load_s2(tracer)
        .filter_spatial(500_000.0, 5_000_000.0, 510_000.0, 5_010_000.0, Some("EPSG:32631"))
        .unwrap();

    let err = session.finish().unwrap_err();
    assert!(err.is_internal());
    assert!(!err.is_user_error());
}

#[test]
fn test_aggregate_crs_from_yaml_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dry_run.yaml");
    std::fs::write(&path, "aggregate_crs: EPSG:3035\ndefault_crs: EPSG:3035\n").unwrap();

    let session = DryRunSession::from_path(&path).unwrap();
    let mut cube = session
        .tracer()
        .load_collection("S2", &LoadParameters::default().with_bands(["B8"]), None)
        .unwrap();
    cube.aggregate_spatial(geojson_input(feature_collection(&[(1.0, 2.0, 1.0)])), "mean")
        .unwrap();

    let report = session.finish().unwrap();
    let set = report.constraints.as_merged().unwrap().values().next().unwrap().clone();
    assert_eq!(
        set.spatial_extent,
        Some(BoundingBox::new(1.0, 2.0, 2.0, 3.0).with_crs("EPSG:3035"))
    );
}

#[test]
fn test_bad_config_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dry_run.toml");
    std::fs::write(&path, "merge = \"sometimes\"").unwrap();

    let err = DryRunSession::from_path(&path).unwrap_err();
    assert!(matches!(err, cubetrace_core::CoreError::Config(_)));
}
