//! Typed settings documents.
//!
//! # Design
//! - Every section defaults field-by-field so partial JSON documents load.
//! - Rate limits stay signed; validation rejects negative values.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Complete application settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Session coordinator settings.
    pub session: SessionSettings,
    /// Logging settings.
    pub telemetry: TelemetrySettings,
}

/// Session coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Sampling period in milliseconds.
    pub tick_interval_ms: u64,
    /// Initial upload cap in KiB/s; `0` means unlimited.
    pub upload_limit_kib: i64,
    /// Initial download cap in KiB/s; `0` means unlimited.
    pub download_limit_kib: i64,
    /// Pending session commands before callers wait.
    pub command_buffer: usize,
    /// Events retained for replay.
    pub event_buffer: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: defaults::TICK_INTERVAL_MS,
            upload_limit_kib: 0,
            download_limit_kib: 0,
            command_buffer: defaults::COMMAND_BUFFER,
            event_buffer: defaults::EVENT_BUFFER,
        }
    }
}

impl SessionSettings {
    /// Sampling period as a [`Duration`].
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// `tracing` filter directive.
    pub level: String,
    /// `pretty` or `json`; inferred from the build profile when absent.
    pub format: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_fill_defaults() -> serde_json::Result<()> {
        let settings: AppSettings =
            serde_json::from_str(r#"{"session": {"upload_limit_kib": 32}}"#)?;
        assert_eq!(settings.session.upload_limit_kib, 32);
        assert_eq!(settings.session.tick_interval(), Duration::from_secs(2));
        assert_eq!(settings.session.command_buffer, 128);
        assert_eq!(settings.telemetry.level, "info");
        assert!(settings.telemetry.format.is_none());
        Ok(())
    }
}
