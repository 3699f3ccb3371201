//! Dry-run session lifecycle
//!
//! A session is constructed from a [`DryRunConfig`], hands out a
//! [`DryRunTracer`] for the replay, and is consumed by [`DryRunSession::finish`]
//! which reads the aggregated constraints exactly once.

use crate::config::DryRunConfig;
use crate::error::CoreResult;
use cubetrace_cube::DryRunTracer;
use cubetrace_lineage::{SessionId, SourceConstraints, TraceRegistry};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

/// Outcome of a finished session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    /// Session the constraints were collected in
    pub session: Uuid,
    /// Registered nodes
    pub nodes: usize,
    /// Leaves the constraints were collected from
    pub leaves: usize,
    /// Whether leaves sharing a source were merged
    pub merged: bool,
    /// Chain policy name
    pub policy: &'static str,
    /// Constraints per logical source
    pub constraints: SourceConstraints,
}

impl SessionReport {
    /// Render as JSON for the access-planning layer
    ///
    /// # Errors
    /// Serialization failure.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// One dry run of one process graph
#[derive(Debug)]
pub struct DryRunSession {
    config: DryRunConfig,
    tracer: DryRunTracer,
}

impl DryRunSession {
    /// Start a session
    #[must_use]
    pub fn new(config: DryRunConfig) -> Self {
        let registry = TraceRegistry::new()
            .with_policy(config.policy.build())
            .with_default_crs(config.default_crs.clone());
        let tracer = DryRunTracer::new(registry).with_aggregate_crs(&config.aggregate_crs);
        tracing::info!(
            session = %tracer.session(),
            policy = ?config.policy,
            merge = config.merge,
            "dry-run session started"
        );
        Self { config, tracer }
    }

    /// Start a session from a configuration file
    ///
    /// # Errors
    /// Configuration loading failure.
    pub fn from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        Ok(Self::new(DryRunConfig::from_path(path)?))
    }

    /// Session id
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.tracer.session()
    }

    /// Session configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &DryRunConfig {
        &self.config
    }

    /// Tracer for replaying the process graph
    #[inline]
    #[must_use]
    pub fn tracer(&self) -> &DryRunTracer {
        &self.tracer
    }

    /// Collect constraints in the configured merge mode and end the session
    ///
    /// # Errors
    /// Internal lineage errors; the session is gone either way.
    pub fn finish(self) -> CoreResult<SessionReport> {
        let merge = self.config.merge;
        self.finish_with(merge)
    }

    /// Collect constraints in the given merge mode and end the session
    ///
    /// # Errors
    /// Internal lineage errors; the session is gone either way.
    pub fn finish_with(self, merge: bool) -> CoreResult<SessionReport> {
        let report = self.tracer.inspect(|registry| {
            registry.source_constraints(merge).map(|constraints| SessionReport {
                session: *registry.session().as_uuid(),
                nodes: registry.len(),
                leaves: registry.leaves().len(),
                merged: merge,
                policy: registry.policy().name(),
                constraints,
            })
        });
        match &report {
            Ok(r) => tracing::info!(session = %r.session, sources = r.constraints.len(), "dry-run session finished"),
            Err(e) => tracing::error!(session = %self.tracer.session(), error = %e, "dry-run session aborted"),
        }
        report.map_err(Into::into)
    }
}
