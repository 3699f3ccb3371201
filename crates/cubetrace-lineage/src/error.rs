//! Error types for lineage tracing
//!
//! Every variant of [`TraceError`] is an internal invariant violation: it
//! points at a defect in the calling pipeline evaluator (or in a collaborator
//! feeding malformed constraint values) and must abort the dry-run session.

use crate::node::{NodeId, SessionId};

/// Errors raised by the trace registry and the constraint union helpers
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TraceError {
    /// A node referenced a parent that was never registered
    #[error("parent {parent} is not registered in session {session}")]
    UnregisteredParent {
        /// The missing parent
        parent: NodeId,
        /// Session of the registry that rejected it
        session: SessionId,
    },

    /// A node id minted by another dry-run session was used
    #[error("node {node} belongs to session {node_session}, not {session}")]
    ForeignNode {
        /// The offending node id
        node: NodeId,
        /// Session that minted the node id
        node_session: SessionId,
        /// Session of the registry it was handed to
        session: SessionId,
    },

    /// Lookup of an id that the registry never minted
    #[error("node {0} is not registered")]
    UnknownNode(NodeId),

    /// Constraint field tag outside of the closed set
    #[error("unknown constraint field: '{0}'")]
    UnknownConstraintField(String),

    /// Two bounding boxes could not be combined
    #[error("coordinate reference systems differ: {left} vs {right}")]
    CrsMismatch {
        /// CRS of the accumulated box
        left: String,
        /// CRS of the incoming box
        right: String,
    },

    /// A temporal bound could not be interpreted as a date or datetime
    #[error("invalid temporal bound: '{0}'")]
    InvalidTemporalExtent(String),
}

impl TraceError {
    /// Create CRS mismatch error
    pub fn crs_mismatch(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::CrsMismatch {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Whether the error is an internal invariant violation.
    ///
    /// Always true for lineage errors; kept as a method so callers can treat
    /// all error types of the workspace uniformly.
    #[inline]
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        true
    }
}

/// Result type alias for lineage operations
pub type TraceResult<T> = Result<T, TraceError>;
