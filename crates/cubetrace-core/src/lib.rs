//! Cubetrace Core
//!
//! Session facade over the lineage and cube crates: configuration, logging
//! and the construct, replay, finish lifecycle of one dry run.
//!
//! # Core Concepts
//!
//! - [`DryRunConfig`]: merge mode, chain policy, CRS defaults, logging
//! - [`DryRunSession`]: owns the tracer of one dry run; consumed by `finish`
//! - [`SessionReport`]: constraints per logical source, ready for serialization
//! - [`init_logging`]: installs the global tracing subscriber
//!
//! # Example
//!
//! ```rust
//! use cubetrace_core::{DataCube, DryRunConfig, DryRunSession, LoadParameters};
//!
//! let session = DryRunSession::new(DryRunConfig::default());
//! session
//!     .tracer()
//!     .load_collection("S2", &LoadParameters::default(), None)
//!     .unwrap()
//!     .filter_bands(&["B2", "B3"])
//!     .unwrap();
//!
//! let report = session.finish().unwrap();
//! assert_eq!(report.constraints.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod error;
mod logging;
mod session;

// Re-exports
pub use config::{ConfigError, DryRunConfig, LogFormat, LoggingConfig, DEFAULT_CRS, DEFAULT_LOG_TARGETS};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use session::{DryRunSession, SessionReport};

pub use cubetrace_cube::{
    AggregatePolygonResult, CubeError, CubeMetadata, DataCube, DelayedVector, DryRunTracer, GeometryInput,
    LoadParameters, PassThroughProcess, VirtualCube,
};
pub use cubetrace_lineage::{
    BoundingBox, ConstraintSet, PolicyKind, SourceConstraints, SourceKey, TemporalExtent, TraceError,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
