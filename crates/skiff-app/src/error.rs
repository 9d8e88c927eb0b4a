//! # Design
//!
//! - Centralize application-level errors for bootstrap and the console.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: skiff_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: skiff_telemetry::TelemetryError,
    },
    /// A session operation failed during bootstrap.
    #[error("session operation failed")]
    Session {
        /// Operation identifier.
        operation: &'static str,
        /// Source session error.
        source: skiff_session::SessionError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: skiff_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: skiff_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn session(
        operation: &'static str,
        source: skiff_session::SessionError,
    ) -> Self {
        Self::Session { operation, source }
    }

    pub(crate) const fn io(operation: &'static str, source: io::Error) -> Self {
        Self::Io { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "load",
            skiff_config::ConfigError::InvalidField {
                section: "session",
                field: "tick_interval_ms",
                value: None,
                reason: "out_of_range",
            },
        );
        assert!(matches!(config, AppError::Config { .. }));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());

        let telemetry = AppError::telemetry(
            "init",
            skiff_telemetry::TelemetryError::UnknownLogFormat {
                value: "xml".into(),
            },
        );
        assert!(matches!(telemetry, AppError::Telemetry { .. }));

        let session = AppError::session("set_upload_limit", skiff_session::SessionError::Closed);
        assert!(matches!(session, AppError::Session { .. }));

        let io = AppError::io("console.read", io::Error::other("closed"));
        assert!(matches!(io, AppError::Io { .. }));
    }
}
