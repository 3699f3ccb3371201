//! Shared handle on the trace registry of one dry-run session

use crate::cube::{DataCube, VirtualCube};
use crate::error::CubeResult;
use crate::metadata::CubeMetadata;
use cubetrace_lineage::{
    BoundingBox, LineageSet, NodeId, Operation, SessionId, Source, SourceConstraints, TemporalExtent,
    TraceRegistry, TraceResult,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::smallvec;
use std::sync::Arc;

/// CRS attached to boxes derived from aggregation geometries
pub const DEFAULT_AGGREGATE_CRS: &str = cubetrace_lineage::DEFAULT_CRS;

/// Extent arguments of `load_collection`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadParameters {
    /// Requested time range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal_extent: Option<TemporalExtent>,
    /// Requested bounding box
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial_extent: Option<BoundingBox>,
    /// Requested bands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bands: Option<Vec<String>>,
}

impl LoadParameters {
    /// Set the temporal extent
    #[must_use]
    pub fn with_temporal_extent(mut self, extent: TemporalExtent) -> Self {
        self.temporal_extent = Some(extent);
        self
    }

    /// Set the spatial extent
    #[must_use]
    pub fn with_spatial_extent(mut self, bbox: BoundingBox) -> Self {
        self.spatial_extent = Some(bbox);
        self
    }

    /// Set the bands
    #[must_use]
    pub fn with_bands<I, S>(mut self, bands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bands = Some(bands.into_iter().map(Into::into).collect());
        self
    }
}

/// Cloneable handle on a [`TraceRegistry`].
///
/// Every [`VirtualCube`] of a session holds one. Replay is sequential; the
/// lock only makes the handle shareable, it does not make concurrent replay
/// of one session meaningful.
#[derive(Debug, Clone)]
pub struct DryRunTracer {
    registry: Arc<RwLock<TraceRegistry>>,
    session: SessionId,
    aggregate_crs: Arc<str>,
}

impl Default for DryRunTracer {
    fn default() -> Self {
        Self::new(TraceRegistry::new())
    }
}

impl DryRunTracer {
    /// Wrap a registry
    #[must_use]
    pub fn new(registry: TraceRegistry) -> Self {
        Self {
            session: registry.session(),
            registry: Arc::new(RwLock::new(registry)),
            aggregate_crs: Arc::from(DEFAULT_AGGREGATE_CRS),
        }
    }

    /// Set the CRS of aggregation-derived boxes
    #[must_use]
    pub fn with_aggregate_crs(mut self, crs: impl AsRef<str>) -> Self {
        self.aggregate_crs = Arc::from(crs.as_ref());
        self
    }

    /// Session of the wrapped registry
    #[inline]
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// CRS of aggregation-derived boxes
    #[inline]
    #[must_use]
    pub fn aggregate_crs(&self) -> &str {
        &self.aggregate_crs
    }

    /// Number of registered nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Run `f` with read access to the registry.
    ///
    /// The registry stays read-locked while `f` runs, so `f` must not load,
    /// filter or otherwise record through this tracer or any cube of its
    /// session; doing so deadlocks.
    pub fn inspect<R>(&self, f: impl FnOnce(&TraceRegistry) -> R) -> R {
        f(&self.registry.read())
    }

    /// Start a new lineage at a fresh source node
    #[must_use]
    pub fn load(&self, source: Source, metadata: Option<CubeMetadata>) -> VirtualCube {
        let id = self.registry.write().register_source(source);
        VirtualCube::new(self.clone(), smallvec![id], metadata)
    }

    /// Load a collection, then apply each load parameter as a filter.
    ///
    /// Filters run in the order temporal, spatial, bands.
    ///
    /// # Errors
    /// Propagates failures of the filter replay.
    pub fn load_collection(
        &self,
        collection_id: &str,
        parameters: &LoadParameters,
        metadata: Option<CubeMetadata>,
    ) -> CubeResult<VirtualCube> {
        let mut cube = self.load(Source::load_collection(collection_id), metadata);
        if let Some(extent) = &parameters.temporal_extent {
            cube = cube.filter_temporal_extent(extent.clone())?;
        }
        if let Some(bbox) = &parameters.spatial_extent {
            cube = cube.filter_bbox(bbox.clone())?;
        }
        if let Some(bands) = &parameters.bands {
            cube = cube.filter_bands(bands.as_slice())?;
        }
        tracing::debug!(collection_id, nodes = cube.lineage().len(), "loaded collection");
        Ok(cube)
    }

    /// Load data from files matching a glob pattern
    #[must_use]
    pub fn load_disk_data(&self, glob_pattern: &str, format: &str, options: Value) -> VirtualCube {
        tracing::debug!(glob_pattern, format, "loading disk data");
        self.load(Source::load_disk_data(glob_pattern, format, options), None)
    }

    pub(crate) fn extend(&self, nodes: &[NodeId], operation: &Operation) -> TraceResult<LineageSet> {
        self.registry.write().extend(nodes, operation)
    }

    /// Aggregated constraints per logical source
    ///
    /// # Errors
    /// Propagates registry failures; all of them are internal.
    pub fn source_constraints(&self, merge: bool) -> TraceResult<SourceConstraints> {
        self.registry.read().source_constraints(merge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_registers_one_source() {
        let tracer = DryRunTracer::default();
        let cube = tracer.load(Source::load_collection("S2"), None);
        assert_eq!(cube.lineage().len(), 1);
        assert_eq!(tracer.node_count(), 1);
        assert!(tracer.inspect(|r| r.get(cube.lineage()[0]).is_some_and(|n| n.is_source())));
    }

    #[test]
    fn load_parameters_apply_in_order() {
        let tracer = DryRunTracer::default();
        let params = LoadParameters::default()
            .with_bands(["B4", "B8"])
            .with_temporal_extent(TemporalExtent::between("2021-01-01", "2021-03-01"));
        let cube = tracer.load_collection("S2", &params, None).unwrap();

        // source, temporal, bands
        assert_eq!(tracer.node_count(), 3);
        let depth = tracer.inspect(|r| r.depth(cube.lineage()[0])).unwrap();
        assert_eq!(depth, 2);
        let names: Vec<String> = tracer.inspect(|r| {
            r.ancestry(cube.lineage()[0])
                .unwrap()
                .into_iter()
                .rev()
                .filter_map(|id| match r.get(id) {
                    Some(cubetrace_lineage::TraceNode::Operation(op)) => Some(op.operation().name().to_string()),
                    _ => None,
                })
                .collect()
        });
        assert_eq!(names, ["temporal_extent", "bands"]);
    }

    #[test]
    fn load_parameters_from_json() {
        let params: LoadParameters = serde_json::from_value(json!({
            "spatial_extent": {"west": 0.0, "south": 0.0, "east": 1.0, "north": 1.0, "crs": "EPSG:4326"},
            "bands": ["B2"]
        }))
        .unwrap();
        assert!(params.temporal_extent.is_none());
        assert_eq!(params.bands.as_deref(), Some(&["B2".to_string()][..]));
    }

    #[test]
    fn disk_data_key_uses_ordered_triple() {
        let tracer = DryRunTracer::default();
        let _cube = tracer.load_disk_data("/data/*.tif", "GTiff", json!({"date_regex": ".*"}));
        let constraints = tracer.source_constraints(true).unwrap();
        let key = constraints.keys()[0].clone();
        assert_eq!(key.process(), "load_disk_data");
        assert_eq!(key.arguments(), json!(["/data/*.tif", "GTiff", {"date_regex": ".*"}]));
    }
}
