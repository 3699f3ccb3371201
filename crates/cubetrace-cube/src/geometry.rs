//! Geometry inputs of spatial aggregation
//!
//! A pipeline hands `aggregate_spatial` one of three things: an already
//! parsed shape, a raw GeoJSON description, or a reference to vector data
//! that has not been read yet. All of them expose [`HasBounds`], which is the
//! only capability a dry run needs.

use crate::error::{CubeError, CubeResult};
use geo::algorithm::bounding_rect::BoundingRect;
use geo_types::{Geometry, GeometryCollection, Rect};
use geojson::GeoJson;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Planar extent as `(west, south, east, north)`
pub type Bounds = (f64, f64, f64, f64);

/// Anything with a spatial extent
pub trait HasBounds {
    /// Extent of the geometry
    ///
    /// # Errors
    /// Fails for empty geometries and for data that cannot be read.
    fn bounds(&self) -> CubeResult<Bounds>;
}

fn rect_bounds(rect: Rect<f64>) -> Bounds {
    let (min, max) = (rect.min(), rect.max());
    (min.x, min.y, max.x, max.y)
}

impl HasBounds for Geometry<f64> {
    fn bounds(&self) -> CubeResult<Bounds> {
        self.bounding_rect()
            .map(rect_bounds)
            .ok_or_else(|| CubeError::invalid_geometry("geometry is empty"))
    }
}

impl HasBounds for GeoJson {
    fn bounds(&self) -> CubeResult<Bounds> {
        let collection: GeometryCollection<f64> =
            geojson::quick_collection(self).map_err(|e| CubeError::invalid_geometry(e.to_string()))?;
        collection
            .bounding_rect()
            .map(rect_bounds)
            .ok_or_else(|| CubeError::invalid_geometry("geojson contains no coordinates"))
    }
}

/// Backing store of a [`DelayedVector`]
pub trait VectorSource: Debug + Send + Sync {
    /// Path or URL, for messages and logs
    fn location(&self) -> &str;

    /// Read and parse the vector data
    ///
    /// # Errors
    /// [`CubeError::VectorSource`] when the data cannot be read or parsed.
    fn load(&self) -> CubeResult<GeoJson>;
}

/// GeoJSON file on the local filesystem
#[derive(Debug, Clone)]
pub struct FileVectorSource {
    path: PathBuf,
    location: String,
}

impl FileVectorSource {
    /// Reference a file; nothing is read until [`VectorSource::load`]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let location = path.display().to_string();
        Self { path, location }
    }

    /// Referenced path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VectorSource for FileVectorSource {
    fn location(&self) -> &str {
        &self.location
    }

    fn load(&self) -> CubeResult<GeoJson> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| CubeError::vector_source(&self.location, e))?;
        text.parse::<GeoJson>()
            .map_err(|e| CubeError::vector_source(&self.location, e))
    }
}

/// Lazily loaded vector data.
///
/// The source is read on the first call to [`HasBounds::bounds`]; the
/// extent is memoized and shared between clones.
#[derive(Debug, Clone)]
pub struct DelayedVector {
    source: Arc<dyn VectorSource>,
    bounds: Arc<OnceCell<Bounds>>,
}

impl DelayedVector {
    /// Wrap a vector source
    #[must_use]
    pub fn new(source: impl VectorSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
            bounds: Arc::new(OnceCell::new()),
        }
    }

    /// Vector file on disk
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(FileVectorSource::new(path))
    }

    /// Location of the backing data
    #[inline]
    #[must_use]
    pub fn location(&self) -> &str {
        self.source.location()
    }

    /// Whether the backing data was already read
    #[inline]
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.bounds.get().is_some()
    }
}

impl HasBounds for DelayedVector {
    fn bounds(&self) -> CubeResult<Bounds> {
        self.bounds
            .get_or_try_init(|| {
                tracing::debug!(location = self.source.location(), "loading delayed vector");
                self.source.load()?.bounds()
            })
            .copied()
    }
}

/// Region argument of spatial aggregation
#[derive(Debug, Clone)]
pub enum GeometryInput {
    /// Already materialized shape
    Geometry(Geometry<f64>),
    /// Raw GeoJSON description
    GeoJson(GeoJson),
    /// Reference to vector data not read yet
    Vector(DelayedVector),
}

impl GeometryInput {
    /// Interpret a process-graph argument.
    ///
    /// A string is a path to vector data, an object is parsed as GeoJSON.
    ///
    /// # Errors
    /// [`CubeError::InvalidGeometry`] for any other JSON value, or for an
    /// object that is not valid GeoJSON.
    pub fn from_value(value: Value) -> CubeResult<Self> {
        match value {
            Value::String(path) => Ok(Self::Vector(DelayedVector::from_path(path))),
            Value::Object(_) => GeoJson::from_json_value(value)
                .map(Self::GeoJson)
                .map_err(|e| CubeError::invalid_geometry(e.to_string())),
            other => Err(CubeError::invalid_geometry(format!(
                "unsupported geometry argument: {other}"
            ))),
        }
    }

    /// Representation name, for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Geometry(_) => "geometry",
            Self::GeoJson(_) => "geojson",
            Self::Vector(_) => "delayed_vector",
        }
    }
}

impl HasBounds for GeometryInput {
    fn bounds(&self) -> CubeResult<Bounds> {
        match self {
            Self::Geometry(geometry) => geometry.bounds(),
            Self::GeoJson(geojson) => geojson.bounds(),
            Self::Vector(vector) => vector.bounds(),
        }
    }
}

impl From<Geometry<f64>> for GeometryInput {
    fn from(geometry: Geometry<f64>) -> Self {
        Self::Geometry(geometry)
    }
}

impl From<GeoJson> for GeometryInput {
    fn from(geojson: GeoJson) -> Self {
        Self::GeoJson(geojson)
    }
}

impl From<DelayedVector> for GeometryInput {
    fn from(vector: DelayedVector) -> Self {
        Self::Vector(vector)
    }
}

impl TryFrom<Value> for GeometryInput {
    type Error = CubeError;

    fn try_from(value: Value) -> CubeResult<Self> {
        Self::from_value(value)
    }
}
