//! Placeholder result of spatial aggregation

use crate::geometry::GeometryInput;
use serde_json::Value;
use std::collections::BTreeMap;

/// Result of `aggregate_spatial` during a dry run.
///
/// No values are computed: the time series is always empty and the regions
/// are the geometries the aggregation was asked for.
#[derive(Debug, Clone)]
pub struct AggregatePolygonResult {
    timeseries: BTreeMap<String, Vec<Value>>,
    regions: GeometryInput,
    reducer: String,
}

impl AggregatePolygonResult {
    pub(crate) fn placeholder(regions: GeometryInput, reducer: impl Into<String>) -> Self {
        Self {
            timeseries: BTreeMap::new(),
            regions,
            reducer: reducer.into(),
        }
    }

    /// Values per timestamp; empty in a dry run
    #[inline]
    #[must_use]
    pub fn timeseries(&self) -> &BTreeMap<String, Vec<Value>> {
        &self.timeseries
    }

    /// Aggregation regions
    #[inline]
    #[must_use]
    pub fn regions(&self) -> &GeometryInput {
        &self.regions
    }

    /// Reducer the aggregation was requested with
    #[inline]
    #[must_use]
    pub fn reducer(&self) -> &str {
        &self.reducer
    }

    /// Consume into the regions
    #[must_use]
    pub fn into_regions(self) -> GeometryInput {
        self.regions
    }
}
