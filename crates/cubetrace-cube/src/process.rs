//! Processes that leave the lineage untouched during a dry run

use crate::error::CubeError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Cube processes that contribute no extent or band constraint.
///
/// Replaying one returns the input cube unchanged. The set is closed; an
/// unknown process id is an error, not a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassThroughProcess {
    /// `resample_spatial`
    ResampleSpatial,
    /// `resample_cube_spatial`
    ResampleCubeSpatial,
    /// `apply`
    Apply,
    /// `apply_kernel`
    ApplyKernel,
    /// `apply_neighborhood`
    ApplyNeighborhood,
    /// `apply_dimension`
    ApplyDimension,
    /// `apply_tiles`
    ApplyTiles,
    /// `apply_tiles_spatiotemporal`
    ApplyTilesSpatiotemporal,
    /// `reduce`
    Reduce,
    /// `reduce_dimension`
    ReduceDimension,
    /// `reduce_bands`
    ReduceBands,
    /// `mask_polygon`
    MaskPolygon,
    /// `add_dimension`
    AddDimension,
    /// `aggregate_temporal`
    AggregateTemporal,
    /// `rename_labels`
    RenameLabels,
    /// `rename_dimension`
    RenameDimension,
    /// `ndvi`
    Ndvi,
}

impl PassThroughProcess {
    /// Every known pass-through process
    pub const ALL: [Self; 17] = [
        Self::ResampleSpatial,
        Self::ResampleCubeSpatial,
        Self::Apply,
        Self::ApplyKernel,
        Self::ApplyNeighborhood,
        Self::ApplyDimension,
        Self::ApplyTiles,
        Self::ApplyTilesSpatiotemporal,
        Self::Reduce,
        Self::ReduceDimension,
        Self::ReduceBands,
        Self::MaskPolygon,
        Self::AddDimension,
        Self::AggregateTemporal,
        Self::RenameLabels,
        Self::RenameDimension,
        Self::Ndvi,
    ];

    /// Process id as used in process graphs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResampleSpatial => "resample_spatial",
            Self::ResampleCubeSpatial => "resample_cube_spatial",
            Self::Apply => "apply",
            Self::ApplyKernel => "apply_kernel",
            Self::ApplyNeighborhood => "apply_neighborhood",
            Self::ApplyDimension => "apply_dimension",
            Self::ApplyTiles => "apply_tiles",
            Self::ApplyTilesSpatiotemporal => "apply_tiles_spatiotemporal",
            Self::Reduce => "reduce",
            Self::ReduceDimension => "reduce_dimension",
            Self::ReduceBands => "reduce_bands",
            Self::MaskPolygon => "mask_polygon",
            Self::AddDimension => "add_dimension",
            Self::AggregateTemporal => "aggregate_temporal",
            Self::RenameLabels => "rename_labels",
            Self::RenameDimension => "rename_dimension",
            Self::Ndvi => "ndvi",
        }
    }
}

impl Display for PassThroughProcess {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PassThroughProcess {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CubeError::UnknownProcess(s.to_string()))
    }
}
