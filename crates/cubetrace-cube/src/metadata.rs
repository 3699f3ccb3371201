//! Cube metadata carried through a replay

use serde::{Deserialize, Serialize};

/// Dimension and band schema of a cube.
///
/// A dry run never inspects it; it is passed through so a pipeline
/// evaluator can resolve dimension names as it would on a real cube.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CubeMetadata {
    /// Collection the cube was loaded from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    /// Dimension names, e.g. `x`, `y`, `t`, `bands`
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Band names in cube order
    #[serde(default)]
    pub bands: Vec<String>,
}

impl CubeMetadata {
    /// Metadata for a collection, without schema
    #[must_use]
    pub fn for_collection(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: Some(collection_id.into()),
            ..Self::default()
        }
    }

    /// Set the dimension names
    #[must_use]
    pub fn with_dimensions<I, S>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions = dimensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the band names
    #[must_use]
    pub fn with_bands<I, S>(mut self, bands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bands = bands.into_iter().map(Into::into).collect();
        self
    }
}
