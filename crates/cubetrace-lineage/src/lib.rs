//! Cubetrace Lineage
//!
//! Provenance forest for pipeline dry runs, and per-source constraint
//! aggregation over it.
//!
//! # Core Concepts
//!
//! - [`TraceNode`]: a [`Source`] (data enters the pipeline) or an
//!   [`OperationNode`] (one transformation of a parent node)
//! - [`TraceRegistry`]: append-only arena owning every node of one session
//! - [`SourceKey`]: content-based identity of a data source, used for grouping
//! - [`ConstraintSet`]: temporal, spatial and band constraints of one source
//! - [`ChainPolicy`]: how repeated filters on one chain are reduced
//!
//! # Example
//!
//! ```rust
//! use cubetrace_lineage::{Operation, Source, TemporalExtent, TraceRegistry};
//!
//! let mut registry = TraceRegistry::new();
//! let source = registry.register_source(Source::load_collection("S2"));
//! let lineage = registry
//!     .extend(&[source], &Operation::TemporalExtent(TemporalExtent::between("2020-01-01", "2020-02-01")))
//!     .unwrap();
//!
//! assert_eq!(registry.leaves(), lineage.to_vec());
//! let constraints = registry.source_constraints(true).unwrap();
//! assert_eq!(constraints.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod constraint;
mod error;
mod key;
mod node;
mod policy;
mod registry;

// Re-exports
pub use constraint::{
    bands_union, normalize_crs, parse_instant, BoundingBox, ConstraintField, ConstraintHistory,
    ConstraintSet, TemporalExtent, DEFAULT_CRS,
};
pub use error::{TraceError, TraceResult};
pub use key::{canonical_json, SourceKey};
pub use node::{NodeId, Operation, OperationNode, SessionId, Source, TraceNode};
pub use policy::{ChainPolicy, Intersect, KeepFirst, PolicyKind};
pub use registry::{LineageSet, SourceConstraints, TraceRegistry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
