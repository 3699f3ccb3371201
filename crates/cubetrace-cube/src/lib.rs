//! Cubetrace Cube
//!
//! Replay-time stand-ins for data cubes. A [`VirtualCube`] exposes the same
//! operations as a real cube but only records them as lineage in the trace
//! registry of its session.
//!
//! # Core Concepts
//!
//! - [`DryRunTracer`]: shared handle on the registry; creates cubes by loading sources
//! - [`VirtualCube`]: a lineage set plus metadata; every operation returns a new cube
//! - [`DataCube`]: the operation surface a pipeline evaluator is written against
//! - [`GeometryInput`]: aggregation regions, reduced to their bounds
//! - [`PassThroughProcess`]: processes that leave the lineage untouched
//!
//! # Example
//!
//! ```rust
//! use cubetrace_cube::{DataCube, DryRunTracer, LoadParameters};
//!
//! let tracer = DryRunTracer::default();
//! let cube = tracer
//!     .load_collection("S2", &LoadParameters::default(), None)
//!     .unwrap()
//!     .filter_temporal("2020-01-01", "2020-02-01")
//!     .unwrap();
//!
//! assert_eq!(cube.lineage().len(), 1);
//! assert_eq!(tracer.source_constraints(true).unwrap().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod aggregate;
mod cube;
mod error;
mod geometry;
mod metadata;
mod process;
mod tracer;

// Re-exports
pub use aggregate::AggregatePolygonResult;
pub use cube::{DataCube, VirtualCube};
pub use error::{CubeError, CubeResult};
pub use geometry::{Bounds, DelayedVector, FileVectorSource, GeometryInput, HasBounds, VectorSource};
pub use metadata::CubeMetadata;
pub use process::PassThroughProcess;
pub use tracer::{DryRunTracer, LoadParameters, DEFAULT_AGGREGATE_CRS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
