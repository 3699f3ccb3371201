//! Global tracing subscriber setup

use crate::config::{ConfigError, LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber described by `config`.
///
/// Returns `false` without changing anything when a global subscriber is
/// already installed, whether by an earlier call or by the host process.
///
/// # Errors
/// [`ConfigError::InvalidLevel`] when the filter directives do not parse.
pub fn init_logging(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let filter = config.env_filter()?;
    let installed = match config.format {
        LogFormat::Basic => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .is_ok(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::info!(directives = %config.directives(), format = ?config.format, "logging initialized");
    } else {
        tracing::debug!("global subscriber already installed");
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_noop() {
        let config = LoggingConfig::default().with_level("warn");
        // Another test may have installed a subscriber first.
        let _ = init_logging(&config).unwrap();
        assert!(!init_logging(&config).unwrap());
    }

    #[test]
    fn invalid_directive_is_rejected_before_install() {
        let config = LoggingConfig::default().with_target("cubetrace_cube", "chatty");
        assert!(matches!(init_logging(&config), Err(ConfigError::InvalidLevel { .. })));
    }
}
