//! Layered settings loader: defaults, then an optional JSON file, then
//! `SKIFF_*` environment variables, then validation.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AppSettings;
use crate::validate::validate;

/// Overrides the sampling period in milliseconds.
pub const ENV_TICK_INTERVAL_MS: &str = "SKIFF_TICK_INTERVAL_MS";
/// Overrides the initial upload cap in KiB/s.
pub const ENV_UPLOAD_LIMIT_KIB: &str = "SKIFF_UPLOAD_LIMIT_KIB";
/// Overrides the initial download cap in KiB/s.
pub const ENV_DOWNLOAD_LIMIT_KIB: &str = "SKIFF_DOWNLOAD_LIMIT_KIB";
/// Overrides the log filter.
pub const ENV_LOG_LEVEL: &str = "SKIFF_LOG_LEVEL";
/// Overrides the log format.
pub const ENV_LOG_FORMAT: &str = "SKIFF_LOG_FORMAT";

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Builder that produces validated [`AppSettings`].
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env: EnvLookup,
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader reading the process environment and no file.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: None,
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Read settings from `path` before applying the environment.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Replace the environment lookup.
    #[must_use]
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Produce validated settings.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] or [`ConfigError::Parse`] when the file cannot be
    /// used, [`ConfigError::InvalidField`] for malformed overrides or values
    /// that fail validation.
    pub fn load(&self) -> ConfigResult<AppSettings> {
        let settings = self.load_layers()?;
        validate(&settings)?;
        Ok(settings)
    }

    /// Apply the file and environment layers without validating, for callers
    /// that add further overrides before calling [`validate`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] or [`ConfigError::Parse`] when the file cannot be
    /// used, [`ConfigError::InvalidField`] for overrides that do not parse.
    pub fn load_layers(&self) -> ConfigResult<AppSettings> {
        let mut settings = match &self.path {
            Some(path) => read_file(path)?,
            None => AppSettings::default(),
        };
        self.apply_env(&mut settings)?;
        Ok(settings)
    }

    fn apply_env(&self, settings: &mut AppSettings) -> ConfigResult<()> {
        if let Some(value) = self.parsed(ENV_TICK_INTERVAL_MS, "session", "tick_interval_ms")? {
            settings.session.tick_interval_ms = value;
        }
        if let Some(value) = self.parsed(ENV_UPLOAD_LIMIT_KIB, "session", "upload_limit_kib")? {
            settings.session.upload_limit_kib = value;
        }
        if let Some(value) = self.parsed(ENV_DOWNLOAD_LIMIT_KIB, "session", "download_limit_kib")? {
            settings.session.download_limit_kib = value;
        }
        if let Some(value) = self.raw(ENV_LOG_LEVEL) {
            settings.telemetry.level = value;
        }
        if let Some(value) = self.raw(ENV_LOG_FORMAT) {
            settings.telemetry.format = Some(value);
        }
        Ok(())
    }

    fn raw(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|value| !value.trim().is_empty())
    }

    fn parsed<T: FromStr>(
        &self,
        key: &str,
        section: &'static str,
        field: &'static str,
    ) -> ConfigResult<Option<T>> {
        let Some(value) = self.raw(key) else {
            return Ok(None);
        };
        debug!(key, "applying environment override");
        value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid(section, field, value, "not_a_number"))
    }
}

fn read_file(path: &Path) -> ConfigResult<AppSettings> {
    let body = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded configuration file");
    serde_json::from_str(&body).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn settings_file(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(body.as_bytes()).expect("write settings");
        file
    }

    #[test]
    fn defaults_without_file_or_env() -> ConfigResult<()> {
        let settings = ConfigLoader::new().with_env(env(&[])).load()?;
        assert_eq!(settings, AppSettings::default());
        Ok(())
    }

    #[test]
    fn environment_overrides_file() -> ConfigResult<()> {
        let file = settings_file(
            r#"{"session": {"tick_interval_ms": 500, "upload_limit_kib": 8},
                "telemetry": {"format": "pretty"}}"#,
        );
        let settings = ConfigLoader::new()
            .with_file(file.path())
            .with_env(env(&[
                (ENV_UPLOAD_LIMIT_KIB, " 64 "),
                (ENV_LOG_FORMAT, "json"),
                (ENV_LOG_LEVEL, ""),
            ]))
            .load()?;
        assert_eq!(settings.session.tick_interval_ms, 500);
        assert_eq!(settings.session.upload_limit_kib, 64);
        assert_eq!(settings.telemetry.format.as_deref(), Some("json"));
        assert_eq!(settings.telemetry.level, "info");
        Ok(())
    }

    #[test]
    fn malformed_override_names_the_field() {
        let err = ConfigLoader::new()
            .with_env(env(&[(ENV_TICK_INTERVAL_MS, "soon")]))
            .load()
            .expect_err("malformed");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "tick_interval_ms",
                reason: "not_a_number",
                ..
            }
        ));
    }

    #[test]
    fn overrides_are_validated() {
        let err = ConfigLoader::new()
            .with_env(env(&[(ENV_DOWNLOAD_LIMIT_KIB, "-3")]))
            .load()
            .expect_err("negative");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                reason: "negative",
                ..
            }
        ));
    }

    #[test]
    fn layers_skip_validation() -> ConfigResult<()> {
        let loader = ConfigLoader::new().with_env(env(&[(ENV_LOG_FORMAT, "xml")]));
        let settings = loader.load_layers()?;
        assert_eq!(settings.telemetry.format.as_deref(), Some("xml"));
        assert!(loader.load().is_err());
        Ok(())
    }

    #[test]
    fn unreadable_and_malformed_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("absent.json");
        let err = ConfigLoader::new()
            .with_file(&missing)
            .with_env(env(&[]))
            .load()
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::Io { .. }));

        let file = settings_file("{ not json");
        let err = ConfigLoader::new()
            .with_file(file.path())
            .with_env(env(&[]))
            .load()
            .expect_err("bad json");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
