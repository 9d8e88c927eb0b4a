//! Validation for loaded settings.

use crate::defaults::{MAX_TICK_INTERVAL_MS, MIN_TICK_INTERVAL_MS};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{AppSettings, SessionSettings, TelemetrySettings};

const SESSION: &str = "session";
const TELEMETRY: &str = "telemetry";

/// Check every section, reporting the first violation.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] naming the offending field.
pub fn validate(settings: &AppSettings) -> ConfigResult<()> {
    validate_session(&settings.session)?;
    validate_telemetry(&settings.telemetry)
}

fn validate_session(session: &SessionSettings) -> ConfigResult<()> {
    if !(MIN_TICK_INTERVAL_MS..=MAX_TICK_INTERVAL_MS).contains(&session.tick_interval_ms) {
        return Err(ConfigError::invalid(
            SESSION,
            "tick_interval_ms",
            session.tick_interval_ms,
            "out_of_range",
        ));
    }
    for (field, value) in [
        ("upload_limit_kib", session.upload_limit_kib),
        ("download_limit_kib", session.download_limit_kib),
    ] {
        if value < 0 {
            return Err(ConfigError::invalid(SESSION, field, value, "negative"));
        }
    }
    for (field, value) in [
        ("command_buffer", session.command_buffer),
        ("event_buffer", session.event_buffer),
    ] {
        if value == 0 {
            return Err(ConfigError::invalid(SESSION, field, value, "must_be_positive"));
        }
    }
    Ok(())
}

fn validate_telemetry(telemetry: &TelemetrySettings) -> ConfigResult<()> {
    if telemetry.level.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            section: TELEMETRY,
            field: "level",
            value: None,
            reason: "empty",
        });
    }
    if let Some(format) = telemetry.format.as_deref()
        && !matches!(format.trim().to_ascii_lowercase().as_str(), "json" | "pretty")
    {
        return Err(ConfigError::invalid(
            TELEMETRY,
            "format",
            format,
            "unknown_format",
        ));
    }
    Ok(())
}
