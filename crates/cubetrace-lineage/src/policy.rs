//! Reduction of repeated constraints along a single lineage
//!
//! A chain may apply the same kind of filter more than once, e.g.
//! `filter_temporal` twice. A [`ChainPolicy`] decides which single value
//! represents the chain when constraints are merged.

use crate::constraint::{BoundingBox, ConstraintHistory, ConstraintSet, TemporalExtent};
use crate::error::TraceResult;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Collapses the root-to-leaf history of one lineage into a constraint set
pub trait ChainPolicy: Debug + Send + Sync {
    /// Short identifier, used in logs
    fn name(&self) -> &'static str;

    /// Reduce temporal filters; `first` is the one closest to the source
    ///
    /// # Errors
    /// Propagates union/intersection failures.
    fn reduce_temporal(&self, first: &TemporalExtent, rest: &[TemporalExtent]) -> TraceResult<TemporalExtent>;

    /// Reduce spatial filters; `first` is the one closest to the source
    ///
    /// # Errors
    /// Propagates union/intersection failures.
    fn reduce_spatial(
        &self,
        first: &BoundingBox,
        rest: &[BoundingBox],
        default_crs: Option<&str>,
    ) -> TraceResult<BoundingBox>;

    /// Reduce band filters; `first` is the one closest to the source
    fn reduce_bands(&self, first: &[String], rest: &[Vec<String>]) -> Vec<String>;

    /// Reduce a whole history; absent fields stay absent.
    ///
    /// # Errors
    /// Propagates the per-field reductions.
    fn reduce(&self, history: &ConstraintHistory, default_crs: Option<&str>) -> TraceResult<ConstraintSet> {
        Ok(ConstraintSet {
            temporal_extent: match history.temporal_extent.as_slice() {
                [] => None,
                [first, rest @ ..] => Some(self.reduce_temporal(first, rest)?),
            },
            spatial_extent: match history.spatial_extent.as_slice() {
                [] => None,
                [first, rest @ ..] => Some(self.reduce_spatial(first, rest, default_crs)?),
            },
            bands: match history.bands.as_slice() {
                [] => None,
                [first, rest @ ..] => Some(self.reduce_bands(first, rest)),
            },
        })
    }
}

/// Only the first application on a chain counts.
///
/// Later filters of the same kind are ignored, even if they are narrower.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepFirst;

impl ChainPolicy for KeepFirst {
    fn name(&self) -> &'static str {
        "keep_first"
    }

    fn reduce_temporal(&self, first: &TemporalExtent, _rest: &[TemporalExtent]) -> TraceResult<TemporalExtent> {
        Ok(first.clone())
    }

    fn reduce_spatial(
        &self,
        first: &BoundingBox,
        _rest: &[BoundingBox],
        _default_crs: Option<&str>,
    ) -> TraceResult<BoundingBox> {
        Ok(first.clone())
    }

    fn reduce_bands(&self, first: &[String], _rest: &[Vec<String>]) -> Vec<String> {
        first.to_vec()
    }
}

/// Every application narrows the chain further
#[derive(Debug, Clone, Copy, Default)]
pub struct Intersect;

impl ChainPolicy for Intersect {
    fn name(&self) -> &'static str {
        "intersect"
    }

    fn reduce_temporal(&self, first: &TemporalExtent, rest: &[TemporalExtent]) -> TraceResult<TemporalExtent> {
        rest.iter().try_fold(first.clone(), |acc, e| acc.intersection(e))
    }

    fn reduce_spatial(
        &self,
        first: &BoundingBox,
        rest: &[BoundingBox],
        default_crs: Option<&str>,
    ) -> TraceResult<BoundingBox> {
        rest.iter()
            .try_fold(first.clone(), |acc, b| acc.intersection(b, default_crs))
    }

    fn reduce_bands(&self, first: &[String], rest: &[Vec<String>]) -> Vec<String> {
        first
            .iter()
            .filter(|band| rest.iter().all(|other| other.contains(*band)))
            .cloned()
            .collect()
    }
}

/// Serializable selector for the built-in policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// [`KeepFirst`]
    #[default]
    KeepFirst,
    /// [`Intersect`]
    Intersect,
}

impl PolicyKind {
    /// Instantiate the policy
    #[must_use]
    pub fn build(self) -> Arc<dyn ChainPolicy> {
        match self {
            Self::KeepFirst => Arc::new(KeepFirst),
            Self::Intersect => Arc::new(Intersect),
        }
    }
}
