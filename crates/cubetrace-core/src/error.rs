//! Top-level error type

use crate::config::ConfigError;
use cubetrace_cube::CubeError;
use cubetrace_lineage::TraceError;

/// Errors surfaced by a dry-run session
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Configuration error
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Cube operation error
    #[error("cube error: {0}")]
    Cube(#[from] CubeError),

    /// Lineage error
    #[error("trace error: {0}")]
    Trace(#[from] TraceError),
}

impl CoreError {
    /// Caused by pipeline input; maps to an invalid-argument response
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Cube(e) if e.is_user_error())
    }

    /// Invariant violation; the session must be aborted
    #[inline]
    #[must_use]
    pub fn is_internal(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Cube(e) => e.is_internal(),
            Self::Trace(e) => e.is_internal(),
        }
    }
}

/// Result type alias for session operations
pub type CoreResult<T> = Result<T, CoreError>;
