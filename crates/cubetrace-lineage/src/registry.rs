//! Trace registry: the arena owning every node of one dry-run session
//!
//! The registry is append-only. Nodes are never removed or mutated, and a
//! node can only be registered once its parent is, so the parent relation
//! is a forest by construction.
//!
//! Replay writes through [`TraceRegistry::register`] and
//! [`TraceRegistry::extend`]; once replay is over,
//! [`TraceRegistry::source_constraints`] reads the aggregated result.

use crate::constraint::{ConstraintField, ConstraintHistory, ConstraintSet, DEFAULT_CRS};
use crate::error::{TraceError, TraceResult};
use crate::key::SourceKey;
use crate::node::{NodeId, Operation, OperationNode, SessionId, Source, TraceNode};
use crate::policy::{ChainPolicy, KeepFirst};
use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;
use std::sync::Arc;

/// Current lineage entries of one cube; usually one or two
pub type LineageSet = SmallVec<[NodeId; 2]>;

/// Constraints grouped by logical source
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SourceConstraints {
    /// One unioned constraint set per source
    Merged(IndexMap<SourceKey, ConstraintSet>),
    /// Raw history of every leaf reaching the source
    PerLeaf(IndexMap<SourceKey, Vec<ConstraintHistory>>),
}

impl SourceConstraints {
    /// Number of distinct sources
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Merged(map) => map.len(),
            Self::PerLeaf(map) => map.len(),
        }
    }

    /// True when no source was loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source keys in first-seen order
    #[must_use]
    pub fn keys(&self) -> Vec<&SourceKey> {
        match self {
            Self::Merged(map) => map.keys().collect(),
            Self::PerLeaf(map) => map.keys().collect(),
        }
    }

    /// Merged view, if this was computed with `merge = true`
    #[must_use]
    pub fn as_merged(&self) -> Option<&IndexMap<SourceKey, ConstraintSet>> {
        match self {
            Self::Merged(map) => Some(map),
            Self::PerLeaf(_) => None,
        }
    }

    /// Per-leaf view, if this was computed with `merge = false`
    #[must_use]
    pub fn as_per_leaf(&self) -> Option<&IndexMap<SourceKey, Vec<ConstraintHistory>>> {
        match self {
            Self::Merged(_) => None,
            Self::PerLeaf(map) => Some(map),
        }
    }
}

/// Append-only arena of trace nodes for one session
#[derive(Debug)]
pub struct TraceRegistry {
    session: SessionId,
    nodes: Vec<TraceNode>,
    policy: Arc<dyn ChainPolicy>,
    default_crs: Option<String>,
}

impl Default for TraceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceRegistry {
    /// Empty registry with the [`KeepFirst`] policy and [`DEFAULT_CRS`] for
    /// boxes without a CRS
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: SessionId::new(),
            nodes: Vec::new(),
            policy: Arc::new(KeepFirst),
            default_crs: Some(DEFAULT_CRS.to_string()),
        }
    }

    /// Use another policy for repeated constraints on one chain
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn ChainPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// CRS assumed for boxes without one when unioning.
    ///
    /// With `None`, an unset CRS only combines with another unset CRS.
    #[must_use]
    pub fn with_default_crs(mut self, crs: Option<String>) -> Self {
        self.default_crs = crs;
        self
    }

    /// Session of this registry
    #[inline]
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Active chain policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &dyn ChainPolicy {
        self.policy.as_ref()
    }

    /// Number of registered nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True before the first registration
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node; `None` for unknown or foreign ids
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&TraceNode> {
        self.node(id).ok()
    }

    /// All nodes with their ids, in registration order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TraceNode)> + '_ {
        let session = self.session;
        self.nodes
            .iter()
            .enumerate()
            .map(move |(index, node)| (NodeId::new(session, index), node))
    }

    fn node(&self, id: NodeId) -> TraceResult<&TraceNode> {
        self.check_session(id)?;
        self.nodes.get(id.index()).ok_or(TraceError::UnknownNode(id))
    }

    fn check_session(&self, id: NodeId) -> TraceResult<()> {
        if id.session() == self.session {
            Ok(())
        } else {
            Err(TraceError::ForeignNode {
                node: id,
                node_session: id.session(),
                session: self.session,
            })
        }
    }

    fn check_parent(&self, parent: NodeId) -> TraceResult<()> {
        self.check_session(parent)?;
        if parent.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(TraceError::UnregisteredParent {
                parent,
                session: self.session,
            })
        }
    }

    fn push(&mut self, node: TraceNode) -> NodeId {
        let id = NodeId::new(self.session, self.nodes.len());
        tracing::trace!(session = %self.session, "registered {} as {}", node, id);
        self.nodes.push(node);
        id
    }

    /// Register a freshly constructed node.
    ///
    /// # Errors
    /// Returns [`TraceError::UnregisteredParent`] or
    /// [`TraceError::ForeignNode`] if the parent of an operation node is not
    /// part of this registry.
    pub fn register(&mut self, node: impl Into<TraceNode>) -> TraceResult<NodeId> {
        let node = node.into();
        if let Some(parent) = node.parent() {
            self.check_parent(parent)?;
        }
        Ok(self.push(node))
    }

    /// Register a new root. Never fails: sources have no parent.
    pub fn register_source(&mut self, source: Source) -> NodeId {
        let key = source.key();
        let id = self.push(TraceNode::Source(source));
        tracing::debug!(session = %self.session, node = %id, source = %key, digest = %key.digest(), "registered source");
        id
    }

    /// Apply `operation` to every node of a lineage set.
    ///
    /// One new operation node is registered per input, in input order; the
    /// returned set has the same length as `nodes`.
    ///
    /// # Errors
    /// Fails without registering anything if one of the inputs is not part
    /// of this registry.
    pub fn extend(&mut self, nodes: &[NodeId], operation: &Operation) -> TraceResult<LineageSet> {
        for &parent in nodes {
            self.check_parent(parent)?;
        }
        tracing::debug!(
            session = %self.session,
            operation = operation.name(),
            fan_out = nodes.len(),
            "extending lineage"
        );
        Ok(nodes
            .iter()
            .map(|&parent| self.push(TraceNode::Operation(OperationNode::new(parent, operation.clone()))))
            .collect())
    }

    /// Path from `id` up to its source, both ends included (leaf first)
    ///
    /// # Errors
    /// Fails for ids not minted by this registry.
    pub fn ancestry(&self, id: NodeId) -> TraceResult<Vec<NodeId>> {
        let mut path = vec![id];
        let mut current = self.node(id)?;
        while let Some(parent) = current.parent() {
            path.push(parent);
            current = self.node(parent)?;
        }
        Ok(path)
    }

    /// Number of operations between `id` and its source
    ///
    /// # Errors
    /// Fails for ids not minted by this registry.
    pub fn depth(&self, id: NodeId) -> TraceResult<usize> {
        Ok(self.ancestry(id)?.len() - 1)
    }

    /// Root of the tree containing `id`
    ///
    /// # Errors
    /// Fails for ids not minted by this registry.
    pub fn source_of(&self, id: NodeId) -> TraceResult<NodeId> {
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent() {
            current = parent;
        }
        Ok(current)
    }

    /// Logical source key of the tree containing `id`
    ///
    /// # Errors
    /// Fails for ids not minted by this registry.
    pub fn source_key(&self, id: NodeId) -> TraceResult<SourceKey> {
        match self.node(self.source_of(id)?)? {
            TraceNode::Source(source) => Ok(source.key()),
            TraceNode::Operation(_) => Err(TraceError::UnknownNode(id)),
        }
    }

    /// Direct children of `id`, in registration order
    ///
    /// # Errors
    /// Fails for ids not minted by this registry.
    pub fn children(&self, id: NodeId) -> TraceResult<Vec<NodeId>> {
        self.node(id)?;
        Ok(self
            .iter()
            .filter(|(_, node)| node.parent() == Some(id))
            .map(|(child, _)| child)
            .collect())
    }

    /// Every node that is not the parent of another node, in registration order.
    ///
    /// Each node walks upward clearing its ancestors; a walk stops at the
    /// first ancestor that was already cleared, since everything above it was
    /// cleared by the same earlier walk. Every node is visited a bounded
    /// number of times, so the whole pass is linear.
    #[must_use]
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut is_leaf = vec![true; self.nodes.len()];
        for node in &self.nodes {
            let mut current = node;
            while let Some(parent) = current.parent() {
                let index = parent.index();
                if !is_leaf[index] {
                    break;
                }
                is_leaf[index] = false;
                current = &self.nodes[index];
            }
        }
        is_leaf
            .into_iter()
            .enumerate()
            .filter(|(_, leaf)| *leaf)
            .map(|(index, _)| NodeId::new(self.session, index))
            .collect()
    }

    /// Operations tagged `operation` on the path from the source to `id`.
    ///
    /// Yields root-to-leaf (chronological) order. Every call performs its
    /// own walk, so the result can be requested again at any time. A source
    /// node yields nothing.
    ///
    /// # Errors
    /// Fails for ids not minted by this registry.
    pub fn arguments_by_operation<'a>(
        &'a self,
        id: NodeId,
        operation: &'a str,
    ) -> TraceResult<impl Iterator<Item = &'a Operation> + 'a> {
        let path = self.ancestry(id)?;
        Ok(path.into_iter().rev().filter_map(move |step| {
            match &self.nodes[step.index()] {
                TraceNode::Operation(node) if node.operation().name() == operation => Some(node.operation()),
                _ => None,
            }
        }))
    }

    /// Every constraining operation on the path to `id`, grouped by field
    ///
    /// # Errors
    /// Fails for ids not minted by this registry.
    pub fn history(&self, id: NodeId) -> TraceResult<ConstraintHistory> {
        let mut history = ConstraintHistory::default();
        for field in ConstraintField::ALL {
            for operation in self.arguments_by_operation(id, field.as_str())? {
                match operation {
                    Operation::TemporalExtent(extent) => history.temporal_extent.push(extent.clone()),
                    Operation::SpatialExtent(bbox) => history.spatial_extent.push(bbox.clone()),
                    Operation::Bands(bands) => history.bands.push(bands.clone()),
                }
            }
        }
        Ok(history)
    }

    /// Constraints per logical source, over every leaf of the forest.
    ///
    /// With `merge`, each leaf history is first reduced by the chain policy
    /// and leaves sharing a source are then unioned field by field. Without
    /// `merge`, the raw history of every leaf is kept, grouped by source.
    ///
    /// # Errors
    /// Propagates union failures; these are internal and end the session.
    pub fn source_constraints(&self, merge: bool) -> TraceResult<SourceConstraints> {
        let leaves = self.leaves();
        let constraints = if merge {
            let mut merged: IndexMap<SourceKey, ConstraintSet> = IndexMap::new();
            for leaf in &leaves {
                let key = self.source_key(*leaf)?;
                let reduced = self
                    .policy
                    .reduce(&self.history(*leaf)?, self.default_crs.as_deref())?;
                tracing::trace!(leaf = %leaf, source = %key, digest = %key.digest(), "reduced leaf history");
                match merged.get_mut(&key) {
                    Some(existing) => existing.merge(reduced, self.default_crs.as_deref())?,
                    None => {
                        merged.insert(key, reduced);
                    }
                }
            }
            SourceConstraints::Merged(merged)
        } else {
            let mut per_leaf: IndexMap<SourceKey, Vec<ConstraintHistory>> = IndexMap::new();
            for leaf in &leaves {
                per_leaf
                    .entry(self.source_key(*leaf)?)
                    .or_default()
                    .push(self.history(*leaf)?);
            }
            SourceConstraints::PerLeaf(per_leaf)
        };

        tracing::info!(
            session = %self.session,
            nodes = self.nodes.len(),
            leaves = leaves.len(),
            sources = constraints.len(),
            merge,
            policy = self.policy.name(),
            "collected source constraints"
        );
        Ok(constraints)
    }
}
