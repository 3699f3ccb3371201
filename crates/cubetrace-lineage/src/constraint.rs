//! Constraint values and their union rules
//!
//! Three kinds of constraint are tracked per data source: a temporal
//! interval, a spatial bounding box and a band subset. Each kind has a union
//! rule used when several lineages of the same source are merged.

use crate::error::{TraceError, TraceResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Closed set of constraint fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintField {
    /// `filter_temporal` and friends
    TemporalExtent,
    /// `filter_bbox` and friends
    SpatialExtent,
    /// `filter_bands`
    Bands,
}

impl ConstraintField {
    /// All fields, in the order they are collected
    pub const ALL: [ConstraintField; 3] = [
        ConstraintField::TemporalExtent,
        ConstraintField::SpatialExtent,
        ConstraintField::Bands,
    ];

    /// Operation tag of the field
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TemporalExtent => "temporal_extent",
            Self::SpatialExtent => "spatial_extent",
            Self::Bands => "bands",
        }
    }
}

impl Display for ConstraintField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConstraintField {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temporal_extent" => Ok(Self::TemporalExtent),
            "spatial_extent" => Ok(Self::SpatialExtent),
            "bands" => Ok(Self::Bands),
            other => Err(TraceError::UnknownConstraintField(other.to_string())),
        }
    }
}

/// Half-open or closed temporal interval `(start, end)`.
///
/// A missing bound means "unbounded" on that side. Bounds are kept as the
/// strings the user supplied; they are only interpreted when two intervals
/// are compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalExtent(pub Option<String>, pub Option<String>);

impl TemporalExtent {
    /// Create an interval
    #[must_use]
    pub fn new(start: Option<impl Into<String>>, end: Option<impl Into<String>>) -> Self {
        Self(start.map(Into::into), end.map(Into::into))
    }

    /// Closed interval between two bounds
    #[must_use]
    pub fn between(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self(Some(start.into()), Some(end.into()))
    }

    /// Start bound
    #[inline]
    #[must_use]
    pub fn start(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// End bound
    #[inline]
    #[must_use]
    pub fn end(&self) -> Option<&str> {
        self.1.as_deref()
    }

    /// Smallest interval enclosing both inputs.
    ///
    /// # Errors
    /// Returns [`TraceError::InvalidTemporalExtent`] if a bound that has to
    /// be compared is not a date or datetime.
    pub fn union(&self, other: &Self) -> TraceResult<Self> {
        let start = match (self.start(), other.start()) {
            (Some(a), Some(b)) => Some(pick(a, b, Ordering::Less)?),
            _ => None,
        };
        let end = match (self.end(), other.end()) {
            (Some(a), Some(b)) => Some(pick(a, b, Ordering::Greater)?),
            _ => None,
        };
        Ok(Self(start, end))
    }

    /// Overlap of both inputs; a missing bound defers to the other side.
    ///
    /// The result may be empty (start after end); that is left to the
    /// consumer to report.
    ///
    /// # Errors
    /// Same as [`TemporalExtent::union`].
    pub fn intersection(&self, other: &Self) -> TraceResult<Self> {
        let start = match (self.start(), other.start()) {
            (Some(a), Some(b)) => Some(pick(a, b, Ordering::Greater)?),
            (a, b) => a.or(b).map(str::to_string),
        };
        let end = match (self.end(), other.end()) {
            (Some(a), Some(b)) => Some(pick(a, b, Ordering::Less)?),
            (a, b) => a.or(b).map(str::to_string),
        };
        Ok(Self(start, end))
    }
}

/// Return the bound that compares as `wanted` against the other one.
///
/// Equal strings need no interpretation. Two bounds chrono cannot read are
/// still comparable when they share one layout (digits in the same places);
/// they are then ordered as strings.
fn pick(a: &str, b: &str, wanted: Ordering) -> TraceResult<String> {
    if a == b {
        return Ok(a.to_string());
    }
    let ordering = match (parse_instant(a), parse_instant(b)) {
        (Ok(ta), Ok(tb)) => tb.cmp(&ta),
        (Err(_), Err(_)) if same_layout(a, b) => b.trim().cmp(a.trim()),
        (Err(e), _) | (_, Err(e)) => return Err(e),
    };
    Ok(if ordering == wanted { b } else { a }.to_string())
}

fn same_layout(a: &str, b: &str) -> bool {
    let layout = |s: &str| -> String {
        s.trim()
            .chars()
            .map(|c| if c.is_ascii_digit() { '0' } else { c })
            .collect()
    };
    layout(a) == layout(b)
}

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Interpret a temporal bound as an instant in UTC.
///
/// Accepts RFC 3339 datetimes with either `T` or a space as separator,
/// offsets with or without a colon, a `Z` suffix, minute precision, naive
/// datetimes (taken as UTC), plain dates, and `YYYY-MM` or `YYYY` (start of
/// the period, midnight UTC).
///
/// # Errors
/// Returns [`TraceError::InvalidTemporalExtent`] for anything else.
pub fn parse_instant(bound: &str) -> TraceResult<DateTime<Utc>> {
    let bound = bound.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(bound) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(bound, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    let naive = bound
        .strip_suffix('Z')
        .or_else(|| bound.strip_suffix('z'))
        .unwrap_or(bound);
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(dt.and_utc());
        }
    }
    let date = match naive.len() {
        4 => format!("{naive}-01-01"),
        7 => format!("{naive}-01"),
        _ => naive.to_string(),
    };
    if let Ok(date) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(TraceError::InvalidTemporalExtent(bound.to_string()))
}

/// CRS assumed for boxes without one
pub const DEFAULT_CRS: &str = "EPSG:4326";

static EPSG_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:EPSG:|https?://www\.opengis\.net/def/crs/EPSG/0/)?(\d+)$")
        .expect("static CRS pattern")
});

/// Normalize a CRS identifier so that equivalent spellings compare equal.
///
/// `4326`, `epsg:4326` and the OGC URL form all become `EPSG:4326`; other
/// identifiers are returned trimmed but otherwise untouched.
#[must_use]
pub fn normalize_crs(crs: &str) -> String {
    let crs = crs.trim();
    match EPSG_CODE.captures(crs) {
        Some(caps) => format!("EPSG:{}", &caps[1]),
        None => crs.to_string(),
    }
}

const UNSET_CRS: &str = "<unset>";

/// Axis-aligned bounding box with an optional coordinate reference system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum x
    pub west: f64,
    /// Minimum y
    pub south: f64,
    /// Maximum x
    pub east: f64,
    /// Maximum y
    pub north: f64,
    /// CRS identifier; unset means "not specified"
    pub crs: Option<String>,
}

impl BoundingBox {
    /// Create a box without CRS
    #[must_use]
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
            crs: None,
        }
    }

    /// Set the CRS
    #[must_use]
    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    /// Resolve the CRS of both boxes against each other.
    ///
    /// An unset CRS falls back to `default_crs`. If both sides are still
    /// unset the result stays unset; if only one is, the boxes cannot be
    /// compared.
    fn reconcile_crs(&self, other: &Self, default_crs: Option<&str>) -> TraceResult<Option<String>> {
        let left = self.crs.as_deref().or(default_crs).map(normalize_crs);
        let right = other.crs.as_deref().or(default_crs).map(normalize_crs);
        match (left, right) {
            (Some(l), Some(r)) if l != r => Err(TraceError::crs_mismatch(l, r)),
            (Some(l), None) => Err(TraceError::crs_mismatch(l, UNSET_CRS)),
            (None, Some(r)) => Err(TraceError::crs_mismatch(UNSET_CRS, r)),
            (l, _) => Ok(l),
        }
    }

    /// Smallest box enclosing both inputs.
    ///
    /// # Errors
    /// Returns [`TraceError::CrsMismatch`] when the reference systems differ.
    pub fn union(&self, other: &Self, default_crs: Option<&str>) -> TraceResult<Self> {
        let crs = self.reconcile_crs(other, default_crs)?;
        Ok(Self {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
            crs,
        })
    }

    /// Overlap of both inputs (possibly degenerate).
    ///
    /// # Errors
    /// Returns [`TraceError::CrsMismatch`] when the reference systems differ.
    pub fn intersection(&self, other: &Self, default_crs: Option<&str>) -> TraceResult<Self> {
        let crs = self.reconcile_crs(other, default_crs)?;
        Ok(Self {
            west: self.west.max(other.west),
            south: self.south.max(other.south),
            east: self.east.min(other.east),
            north: self.north.min(other.north),
            crs,
        })
    }
}

/// Order-preserving, duplicate-free union of two band lists
#[must_use]
pub fn bands_union(a: &[String], b: &[String]) -> Vec<String> {
    a.iter()
        .chain(b)
        .cloned()
        .collect::<IndexSet<String>>()
        .into_iter()
        .collect()
}

/// Aggregated constraints of one data source
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstraintSet {
    /// Required temporal interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal_extent: Option<TemporalExtent>,
    /// Required bounding box
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial_extent: Option<BoundingBox>,
    /// Required bands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bands: Option<Vec<String>>,
}

impl ConstraintSet {
    /// True when no field is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.temporal_extent.is_none() && self.spatial_extent.is_none() && self.bands.is_none()
    }

    /// Whether a given field carries a value
    #[must_use]
    pub fn has(&self, field: ConstraintField) -> bool {
        match field {
            ConstraintField::TemporalExtent => self.temporal_extent.is_some(),
            ConstraintField::SpatialExtent => self.spatial_extent.is_some(),
            ConstraintField::Bands => self.bands.is_some(),
        }
    }

    /// Fold another set into this one, field by field.
    ///
    /// A field present on one side only is taken as is; a field present on
    /// both sides is combined with the union rule of its kind.
    ///
    /// # Errors
    /// Propagates union failures (CRS mismatch, unreadable temporal bound).
    pub fn merge(&mut self, other: ConstraintSet, default_crs: Option<&str>) -> TraceResult<()> {
        let ConstraintSet {
            temporal_extent,
            spatial_extent,
            bands,
        } = other;

        if let Some(incoming) = temporal_extent {
            self.temporal_extent = Some(match self.temporal_extent.take() {
                Some(orig) => orig.union(&incoming)?,
                None => incoming,
            });
        }
        if let Some(incoming) = spatial_extent {
            self.spatial_extent = Some(match self.spatial_extent.take() {
                Some(orig) => orig.union(&incoming, default_crs)?,
                None => incoming,
            });
        }
        if let Some(incoming) = bands {
            self.bands = Some(match self.bands.take() {
                Some(orig) => bands_union(&orig, &incoming),
                None => incoming,
            });
        }
        Ok(())
    }
}

/// Unreduced constraints of one leaf: every application, root to leaf
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstraintHistory {
    /// All temporal filters on the chain
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub temporal_extent: Vec<TemporalExtent>,
    /// All spatial filters on the chain
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub spatial_extent: Vec<BoundingBox>,
    /// All band filters on the chain
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bands: Vec<Vec<String>>,
}

impl ConstraintHistory {
    /// True when the chain carries no constraint at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.temporal_extent.is_empty() && self.spatial_extent.is_empty() && self.bands.is_empty()
    }
}
