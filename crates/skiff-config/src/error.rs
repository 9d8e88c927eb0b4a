//! Error types for configuration loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// The configuration file could not be read.
    #[error("failed to read configuration file")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },
    /// The configuration file was not a valid settings document.
    #[error("failed to parse configuration file")]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Underlying JSON failure.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        section: &'static str,
        field: &'static str,
        value: impl ToString,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            section,
            field,
            value: Some(value.to_string()),
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_field_keeps_context_out_of_message() {
        let err = ConfigError::invalid("session", "tick_interval_ms", 5, "out_of_range");
        assert_eq!(err.to_string(), "invalid configuration field");
        match err {
            ConfigError::InvalidField {
                section,
                field,
                value,
                reason,
            } => {
                assert_eq!(section, "session");
                assert_eq!(field, "tick_interval_ms");
                assert_eq!(value.as_deref(), Some("5"));
                assert_eq!(reason, "out_of_range");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
