//! Error types for virtual cube operations

use cubetrace_lineage::TraceError;

/// Errors raised while replaying cube operations
#[derive(Debug, thiserror::Error)]
pub enum CubeError {
    /// Geometry of an unsupported representation, or without extent
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A lazily referenced vector could not be loaded
    #[error("failed to load vector from {location}: {message}")]
    VectorSource {
        /// Path or URL of the vector data
        location: String,
        /// Underlying cause
        message: String,
    },

    /// Process id outside the known pass-through set
    #[error("unknown process: '{0}'")]
    UnknownProcess(String),

    /// Lineage invariant violation
    #[error("trace error: {0}")]
    Trace(#[from] TraceError),
}

impl CubeError {
    /// Create invalid geometry error
    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry(message.into())
    }

    /// Create vector source error
    pub fn vector_source(location: impl Into<String>, message: impl ToString) -> Self {
        Self::VectorSource {
            location: location.into(),
            message: message.to_string(),
        }
    }

    /// Caused by user input; maps to an invalid-argument response
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidGeometry(_) | Self::VectorSource { .. } | Self::UnknownProcess(_)
        )
    }

    /// Invariant violation; the dry-run session must be aborted
    #[inline]
    #[must_use]
    pub fn is_internal(&self) -> bool {
        !self.is_user_error()
    }
}

/// Result type alias for cube operations
pub type CubeResult<T> = Result<T, CubeError>;
