//! Trace node model
//!
//! Nodes live in a [`TraceRegistry`](crate::TraceRegistry) arena and are
//! addressed by [`NodeId`]. Identity is the id, never the node content: two
//! sources loading the same collection are distinct nodes sharing a
//! [`SourceKey`].

use crate::constraint::{BoundingBox, ConstraintField, TemporalExtent};
use crate::key::{canonical_json, SourceKey};
use serde_json::{json, Value};
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Identifier of one dry-run session (one registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Fresh random session id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Arena address of a trace node.
///
/// Only a registry mints ids. The session tag lets a registry reject ids
/// that were produced by another session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    session: SessionId,
    index: usize,
}

impl NodeId {
    #[inline]
    pub(crate) const fn new(session: SessionId, index: usize) -> Self {
        Self { session, index }
    }

    /// Session that minted this id
    #[inline]
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Registration order within the session
    #[inline]
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Data-generating process: where data enters the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    process: String,
    arguments: Value,
}

impl Source {
    /// Source for an arbitrary process tag
    #[must_use]
    pub fn new(process: impl Into<String>, arguments: Value) -> Self {
        Self {
            process: process.into(),
            arguments,
        }
    }

    /// `load_collection(collection_id)`
    #[must_use]
    pub fn load_collection(collection_id: impl Into<String>) -> Self {
        Self::new("load_collection", json!([collection_id.into()]))
    }

    /// `load_disk_data(glob_pattern, format, options)`
    #[must_use]
    pub fn load_disk_data(glob_pattern: impl Into<String>, format: impl Into<String>, options: Value) -> Self {
        Self::new(
            "load_disk_data",
            json!([glob_pattern.into(), format.into(), options]),
        )
    }

    /// Process tag
    #[inline]
    #[must_use]
    pub fn process(&self) -> &str {
        &self.process
    }

    /// Process arguments
    #[inline]
    #[must_use]
    pub fn arguments(&self) -> &Value {
        &self.arguments
    }

    /// Logical source key
    #[must_use]
    pub fn key(&self) -> SourceKey {
        SourceKey::new(self.process.clone(), &self.arguments)
    }
}

/// A transformation recorded on a lineage
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Temporal filter
    TemporalExtent(TemporalExtent),
    /// Spatial filter
    SpatialExtent(BoundingBox),
    /// Band filter
    Bands(Vec<String>),
}

impl Operation {
    /// Operation tag as used by [`TraceRegistry::arguments_by_operation`](crate::TraceRegistry::arguments_by_operation)
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.field().as_str()
    }

    /// Constraint field the operation restricts
    #[must_use]
    pub const fn field(&self) -> ConstraintField {
        match self {
            Self::TemporalExtent(_) => ConstraintField::TemporalExtent,
            Self::SpatialExtent(_) => ConstraintField::SpatialExtent,
            Self::Bands(_) => ConstraintField::Bands,
        }
    }

    /// Arguments as a JSON value
    #[must_use]
    pub fn arguments(&self) -> Value {
        match self {
            Self::TemporalExtent(extent) => json!([extent.start(), extent.end()]),
            Self::SpatialExtent(bbox) => json!({
                "west": bbox.west,
                "south": bbox.south,
                "east": bbox.east,
                "north": bbox.north,
                "crs": bbox.crs,
            }),
            Self::Bands(bands) => json!(bands),
        }
    }
}

/// A node applying one operation to a parent node
#[derive(Debug, Clone, PartialEq)]
pub struct OperationNode {
    parent: NodeId,
    operation: Operation,
}

impl OperationNode {
    /// Create a node on top of `parent`
    #[must_use]
    pub const fn new(parent: NodeId, operation: Operation) -> Self {
        Self { parent, operation }
    }

    /// The node this operation was applied to
    #[inline]
    #[must_use]
    pub const fn parent(&self) -> NodeId {
        self.parent
    }

    /// The recorded operation
    #[inline]
    #[must_use]
    pub const fn operation(&self) -> &Operation {
        &self.operation
    }
}

/// Node of the provenance forest
#[derive(Debug, Clone, PartialEq)]
pub enum TraceNode {
    /// Root: a data source
    Source(Source),
    /// Transformation of a parent node
    Operation(OperationNode),
}

impl TraceNode {
    /// Parent link; `None` for sources
    #[inline]
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        match self {
            Self::Source(_) => None,
            Self::Operation(op) => Some(op.parent),
        }
    }

    /// Whether this is a source node
    #[inline]
    #[must_use]
    pub const fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }
}

impl From<Source> for TraceNode {
    fn from(source: Source) -> Self {
        Self::Source(source)
    }
}

impl From<OperationNode> for TraceNode {
    fn from(node: OperationNode) -> Self {
        Self::Operation(node)
    }
}

impl Display for TraceNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(s) => write!(f, "Source({}, {})", s.process, canonical_json(&s.arguments)),
            Self::Operation(op) => write!(
                f,
                "Operation({}, {}, {})",
                op.parent,
                op.operation.name(),
                canonical_json(&op.operation.arguments())
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_factories() {
        let s = Source::load_collection("S2");
        assert_eq!(s.process(), "load_collection");
        assert_eq!(s.arguments(), &json!(["S2"]));

        let d = Source::load_disk_data("/data/*.tif", "GTiff", json!({"date_regex": ".*"}));
        assert_eq!(d.process(), "load_disk_data");
        assert_eq!(d.arguments()[1], json!("GTiff"));
    }

    #[test]
    fn equal_sources_share_key() {
        assert_eq!(Source::load_collection("S2").key(), Source::load_collection("S2").key());
        assert_ne!(Source::load_collection("S2").key(), Source::load_collection("S1").key());
    }

    #[test]
    fn operation_tags() {
        let op = Operation::Bands(vec!["B2".into()]);
        assert_eq!(op.name(), "bands");
        assert_eq!(op.field(), ConstraintField::Bands);
    }

    #[test]
    fn spatial_arguments_carry_every_field() {
        let op = Operation::SpatialExtent(BoundingBox::new(0.0, 1.0, 2.0, 3.0).with_crs("EPSG:4326"));
        assert_eq!(
            op.arguments(),
            json!({"west": 0.0, "south": 1.0, "east": 2.0, "north": 3.0, "crs": "EPSG:4326"})
        );
        let unset = Operation::SpatialExtent(BoundingBox::new(0.0, 1.0, 2.0, 3.0));
        assert_eq!(unset.arguments()["crs"], Value::Null);
    }

    #[test]
    fn display_nodes() {
        let session = SessionId::new();
        let source = TraceNode::from(Source::load_collection("S2"));
        assert_eq!(source.to_string(), r#"Source(load_collection, ["S2"])"#);

        let op = TraceNode::from(OperationNode::new(
            NodeId::new(session, 0),
            Operation::TemporalExtent(TemporalExtent::between("2020-01-01", "2020-02-01")),
        ));
        assert_eq!(
            op.to_string(),
            r#"Operation(#0, temporal_extent, ["2020-01-01","2020-02-01"])"#
        );
        assert_eq!(op.parent(), Some(NodeId::new(session, 0)));
        assert!(!op.is_source());
    }
}
