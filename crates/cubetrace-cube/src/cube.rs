//! Virtual cube: the replay-time stand-in for a data cube

use crate::aggregate::AggregatePolygonResult;
use crate::error::{CubeError, CubeResult};
use crate::geometry::{GeometryInput, HasBounds};
use crate::metadata::CubeMetadata;
use crate::process::PassThroughProcess;
use crate::tracer::DryRunTracer;
use cubetrace_lineage::{BoundingBox, LineageSet, NodeId, Operation, TemporalExtent, TraceError};

/// Operational surface shared by real and virtual cubes.
///
/// A pipeline evaluator written against this trait can run a process graph
/// for real or replay it as a dry run.
pub trait DataCube: Sized {
    /// Error of cube operations
    type Error;
    /// Result of spatial aggregation
    type Aggregate;

    /// Restrict to the time range `[start, end)`
    ///
    /// # Errors
    /// Implementation specific.
    fn filter_temporal(&self, start: &str, end: &str) -> Result<Self, Self::Error>;

    /// Restrict to a bounding box; an unset `crs` is left unset
    ///
    /// # Errors
    /// Implementation specific.
    fn filter_spatial(
        &self,
        west: f64,
        south: f64,
        east: f64,
        north: f64,
        crs: Option<&str>,
    ) -> Result<Self, Self::Error>;

    /// Restrict to the named bands
    ///
    /// # Errors
    /// Implementation specific.
    fn filter_bands<S: AsRef<str>>(&self, bands: &[S]) -> Result<Self, Self::Error>;

    /// Mask with another cube
    ///
    /// # Errors
    /// Implementation specific.
    fn mask(&self, mask: &Self) -> Result<Self, Self::Error>;

    /// Combine with another cube
    ///
    /// # Errors
    /// Implementation specific.
    fn merge_cubes(&self, other: &Self) -> Result<Self, Self::Error>;

    /// Aggregate over regions with the named reducer
    ///
    /// # Errors
    /// Fails for geometries without a usable extent.
    fn aggregate_spatial(&mut self, geometries: GeometryInput, reducer: &str) -> Result<Self::Aggregate, Self::Error>;

    /// Apply a process that does not restrict the cube's extent
    #[must_use]
    fn pass_through(&self, process: PassThroughProcess) -> Self;
}

/// Cube that records operations instead of computing data.
///
/// Holds one lineage entry per root it descends from. Constraining
/// operations map over the entries, combining operations concatenate them.
#[derive(Debug, Clone)]
pub struct VirtualCube {
    tracer: DryRunTracer,
    lineage: LineageSet,
    metadata: Option<CubeMetadata>,
}

impl VirtualCube {
    pub(crate) fn new(tracer: DryRunTracer, lineage: LineageSet, metadata: Option<CubeMetadata>) -> Self {
        Self {
            tracer,
            lineage,
            metadata,
        }
    }

    /// Current lineage entries, in order
    #[inline]
    #[must_use]
    pub fn lineage(&self) -> &[NodeId] {
        &self.lineage
    }

    /// Cube metadata, if known
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> Option<&CubeMetadata> {
        self.metadata.as_ref()
    }

    /// Tracer this cube records into
    #[inline]
    #[must_use]
    pub fn tracer(&self) -> &DryRunTracer {
        &self.tracer
    }

    /// Record `operation` on every lineage entry
    fn derive(&self, operation: &Operation) -> CubeResult<Self> {
        let lineage = self.tracer.extend(&self.lineage, operation)?;
        Ok(Self::new(self.tracer.clone(), lineage, self.metadata.clone()))
    }

    /// Fan-in of two cubes; no node is created and metadata is dropped
    fn combine(&self, other: &Self) -> CubeResult<Self> {
        let session = self.tracer.session();
        if let Some(&node) = other.lineage.iter().find(|id| id.session() != session) {
            return Err(TraceError::ForeignNode {
                node,
                node_session: node.session(),
                session,
            }
            .into());
        }
        let mut lineage = self.lineage.clone();
        lineage.extend_from_slice(&other.lineage);
        Ok(Self::new(self.tracer.clone(), lineage, None))
    }

    /// Temporal filter with optionally open bounds
    ///
    /// # Errors
    /// Propagates registry failures.
    pub fn filter_temporal_extent(&self, extent: TemporalExtent) -> CubeResult<Self> {
        self.derive(&Operation::TemporalExtent(extent))
    }

    /// Spatial filter from a bounding box record
    ///
    /// # Errors
    /// Propagates registry failures.
    pub fn filter_bbox(&self, bbox: BoundingBox) -> CubeResult<Self> {
        self.derive(&Operation::SpatialExtent(bbox))
    }

    /// Alias of [`DataCube::aggregate_spatial`]
    ///
    /// # Errors
    /// See [`DataCube::aggregate_spatial`].
    pub fn zonal_statistics(&mut self, regions: GeometryInput, func: &str) -> CubeResult<AggregatePolygonResult> {
        self.aggregate_spatial(regions, func)
    }

    /// Resampling to another cube's grid does not restrict the extent
    #[must_use]
    pub fn resample_cube_spatial(&self, _target: &Self, method: &str) -> Self {
        tracing::trace!(method, "resample_cube_spatial is a pass-through");
        self.pass_through(PassThroughProcess::ResampleCubeSpatial)
    }

    /// Replay a pass-through process by id
    ///
    /// # Errors
    /// [`CubeError::UnknownProcess`] for ids outside the pass-through set.
    pub fn apply_process(&self, process_id: &str) -> CubeResult<Self> {
        let process = process_id.parse::<PassThroughProcess>().map_err(|e| {
            tracing::warn!(process_id, "not a pass-through process");
            e
        })?;
        Ok(self.pass_through(process))
    }
}

impl DataCube for VirtualCube {
    type Error = CubeError;
    type Aggregate = AggregatePolygonResult;

    fn filter_temporal(&self, start: &str, end: &str) -> CubeResult<Self> {
        self.filter_temporal_extent(TemporalExtent::between(start, end))
    }

    fn filter_spatial(&self, west: f64, south: f64, east: f64, north: f64, crs: Option<&str>) -> CubeResult<Self> {
        let bbox = BoundingBox::new(west, south, east, north);
        self.filter_bbox(match crs {
            Some(crs) => bbox.with_crs(crs),
            None => bbox,
        })
    }

    fn filter_bands<S: AsRef<str>>(&self, bands: &[S]) -> CubeResult<Self> {
        let bands = bands.iter().map(|b| b.as_ref().to_string()).collect();
        self.derive(&Operation::Bands(bands))
    }

    fn mask(&self, mask: &Self) -> CubeResult<Self> {
        self.combine(mask)
    }

    fn merge_cubes(&self, other: &Self) -> CubeResult<Self> {
        self.combine(other)
    }

    fn aggregate_spatial(&mut self, geometries: GeometryInput, reducer: &str) -> CubeResult<AggregatePolygonResult> {
        let (west, south, east, north) = geometries.bounds().map_err(|e| {
            tracing::warn!(kind = geometries.kind(), error = %e, "rejected aggregation geometry");
            e
        })?;
        let crs = self.tracer.aggregate_crs().to_string();
        *self = self.filter_spatial(west, south, east, north, Some(&crs))?;
        tracing::debug!(
            kind = geometries.kind(),
            reducer,
            west,
            south,
            east,
            north,
            "aggregation recorded as spatial filter"
        );
        Ok(AggregatePolygonResult::placeholder(geometries, reducer))
    }

    fn pass_through(&self, process: PassThroughProcess) -> Self {
        tracing::trace!(%process, "pass-through");
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubetrace_lineage::{Source, TraceNode};
    use geo_types::{Geometry, Point};
    use serde_json::json;

    fn s2(tracer: &DryRunTracer) -> VirtualCube {
        tracer.load(
            Source::load_collection("S2"),
            Some(CubeMetadata::for_collection("S2").with_bands(["B2", "B3", "B4"])),
        )
    }

    #[test]
    fn constraining_operations_map_over_lineage() {
        let tracer = DryRunTracer::default();
        let merged = s2(&tracer).merge_cubes(&s2(&tracer)).unwrap();
        assert_eq!(merged.lineage().len(), 2);
        assert_eq!(tracer.node_count(), 2);

        let filtered = merged.filter_bands(&["B2"]).unwrap();
        assert_eq!(filtered.lineage().len(), 2);
        assert_eq!(tracer.node_count(), 4);
        for (parent, child) in merged.lineage().iter().zip(filtered.lineage()) {
            let node = tracer.inspect(|r| r.get(*child).cloned()).unwrap();
            assert_eq!(node.parent(), Some(*parent));
        }
    }

    #[test]
    fn filters_keep_metadata_combiners_drop_it() {
        let tracer = DryRunTracer::default();
        let cube = s2(&tracer).filter_temporal("2020-01-01", "2020-02-01").unwrap();
        assert_eq!(cube.metadata().and_then(|m| m.collection_id.as_deref()), Some("S2"));

        let masked = cube.mask(&s2(&tracer)).unwrap();
        assert!(masked.metadata().is_none());
        assert_eq!(masked.lineage()[0], cube.lineage()[0]);
    }

    #[test]
    fn pass_through_creates_no_nodes() {
        let tracer = DryRunTracer::default();
        let cube = s2(&tracer);
        let before = tracer.node_count();
        let same = cube.apply_process("reduce_dimension").unwrap();
        let resampled = same.resample_cube_spatial(&cube, "near");
        assert_eq!(resampled.lineage(), cube.lineage());
        assert_eq!(tracer.node_count(), before);
    }

    #[test]
    fn unknown_process_is_rejected() {
        let tracer = DryRunTracer::default();
        let err = s2(&tracer).apply_process("fit_curve").unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn aggregate_spatial_records_bbox() {
        let tracer = DryRunTracer::default();
        let mut cube = s2(&tracer);
        let source = cube.lineage()[0];
        let regions = GeometryInput::from_value(json!({
            "type": "Polygon",
            "coordinates": [[[1.0, 2.0], [3.0, 2.0], [3.0, 5.0], [1.0, 2.0]]]
        }))
        .unwrap();

        let result = cube.aggregate_spatial(regions, "mean").unwrap();
        assert!(result.timeseries().is_empty());
        assert_eq!(result.reducer(), "mean");
        assert_eq!(result.regions().kind(), "geojson");

        let node = tracer.inspect(|r| r.get(cube.lineage()[0]).cloned()).unwrap();
        match node {
            TraceNode::Operation(op) => {
                assert_eq!(op.parent(), source);
                assert_eq!(
                    op.operation(),
                    &Operation::SpatialExtent(BoundingBox::new(1.0, 2.0, 3.0, 5.0).with_crs("EPSG:4326"))
                );
            }
            TraceNode::Source(_) => panic!("aggregation did not extend the lineage"),
        }
    }

    #[test]
    fn aggregate_spatial_uses_configured_crs() {
        let tracer = DryRunTracer::default().with_aggregate_crs("EPSG:3857");
        let mut cube = s2(&tracer);
        cube.zonal_statistics(Geometry::from(Point::new(5.0, 6.0)).into(), "max")
            .unwrap();
        let constraints = tracer.source_constraints(true).unwrap();
        let set = constraints.as_merged().unwrap().values().next().unwrap();
        assert_eq!(set.spatial_extent.as_ref().unwrap().crs.as_deref(), Some("EPSG:3857"));
    }

    #[test]
    fn unusable_geometry_leaves_lineage_unchanged() {
        let tracer = DryRunTracer::default();
        let mut cube = s2(&tracer);
        let before = cube.lineage().to_vec();
        let empty = GeometryInput::from_value(json!({"type": "GeometryCollection", "geometries": []})).unwrap();

        let err = cube.aggregate_spatial(empty, "mean").unwrap_err();
        assert!(matches!(err, CubeError::InvalidGeometry(_)));
        assert_eq!(cube.lineage(), &before[..]);
        assert_eq!(tracer.node_count(), 1);
    }

    #[test]
    fn foreign_cubes_cannot_be_combined() {
        let left = DryRunTracer::default();
        let right = DryRunTracer::default();
        let err = s2(&left).merge_cubes(&s2(&right)).unwrap_err();
        assert!(matches!(err, CubeError::Trace(TraceError::ForeignNode { .. })));
        assert!(err.is_internal());
    }
}
