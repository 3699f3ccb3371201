//! Dry-run session configuration

use cubetrace_lineage::PolicyKind;

/// CRS assumed for bounding boxes without one, and attached to aggregation boxes
pub use cubetrace_lineage::DEFAULT_CRS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Crates whose log level is configured by default
pub const DEFAULT_LOG_TARGETS: [&str; 3] = ["cubetrace_lineage", "cubetrace_cube", "cubetrace_core"];

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying cause
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed YAML
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File extension is neither TOML nor YAML
    #[error("unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    /// Log level or filter directive that does not parse
    #[error("invalid log directive '{directive}': {message}")]
    InvalidLevel {
        /// Rejected directive
        directive: String,
        /// Parser message
        message: String,
    },

    /// Semantically invalid value
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable lines with UTC timestamps
    #[default]
    Basic,
    /// One JSON record per event
    Json,
}

/// Logging setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Level for targets without an explicit entry
    pub level: String,
    /// Per-target levels
    pub targets: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Basic,
            level: "info".to_string(),
            targets: DEFAULT_LOG_TARGETS
                .iter()
                .map(|t| ((*t).to_string(), "info".to_string()))
                .collect(),
        }
    }
}

impl LoggingConfig {
    /// With output format
    #[inline]
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// With default level
    #[inline]
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// With level for one target
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.targets.insert(target.into(), level.into());
        self
    }

    /// Filter directives, e.g. `info,cubetrace_cube=debug`
    #[must_use]
    pub fn directives(&self) -> String {
        std::iter::once(self.level.clone())
            .chain(self.targets.iter().map(|(target, level)| format!("{target}={level}")))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Build the subscriber filter
    ///
    /// # Errors
    /// [`ConfigError::InvalidLevel`] when a directive does not parse.
    pub fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        let directives = self.directives();
        EnvFilter::try_new(&directives).map_err(|e| ConfigError::InvalidLevel {
            directive: directives,
            message: e.to_string(),
        })
    }
}

/// Settings of one dry-run session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DryRunConfig {
    /// Merge constraints of leaves sharing a source when finishing
    pub merge: bool,
    /// Reduction of repeated filters on one chain
    pub policy: PolicyKind,
    /// CRS assumed for bounding boxes without one
    pub default_crs: Option<String>,
    /// CRS of boxes derived from aggregation geometries
    pub aggregate_crs: String,
    /// Logging setup
    pub logging: LoggingConfig,
}

impl Default for DryRunConfig {
    fn default() -> Self {
        Self {
            merge: true,
            policy: PolicyKind::KeepFirst,
            default_crs: Some(DEFAULT_CRS.to_string()),
            aggregate_crs: DEFAULT_CRS.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl DryRunConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With merge mode
    #[inline]
    #[must_use]
    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    /// With chain policy
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    /// With default CRS; `None` leaves unset reference systems unset
    #[inline]
    #[must_use]
    pub fn with_default_crs(mut self, crs: Option<String>) -> Self {
        self.default_crs = crs;
        self
    }

    /// With aggregation CRS
    #[inline]
    #[must_use]
    pub fn with_aggregate_crs(mut self, crs: impl Into<String>) -> Self {
        self.aggregate_crs = crs.into();
        self
    }

    /// With logging setup
    #[inline]
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Check values that deserialization cannot
    ///
    /// # Errors
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aggregate_crs.trim().is_empty() {
            return Err(ConfigError::Invalid("aggregate_crs must not be empty".into()));
        }
        if self.default_crs.as_deref().is_some_and(|crs| crs.trim().is_empty()) {
            return Err(ConfigError::Invalid("default_crs must not be empty".into()));
        }
        self.logging.env_filter().map(|_| ())
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Parse or validation failure.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate YAML
    ///
    /// # Errors
    /// Parse or validation failure.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// I/O, format, parse or validation failure.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match extension.as_str() {
            "toml" => Self::from_toml_str(&text),
            "yaml" | "yml" => Self::from_yaml_str(&text),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}
