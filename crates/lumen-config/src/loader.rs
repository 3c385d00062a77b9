//! Settings resolution: YAML document, then environment overrides, then validation.

use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ConfigError, ConfigResult};
use crate::model::Settings;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "LUMEN_CONFIG";
/// Configuration file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

const ENV_APP_NAME: &str = "APP_NAME";
const ENV_APP_VERSION: &str = "APP_VERSION";
const ENV_CONNECTION_STRING: &str = "AZURE_CONNECTION_STRING";
const ENV_CONNECTION_STRING_FALLBACK: &str = "APPLICATIONINSIGHTS_CONNECTION_STRING";
const ENV_LOGGING_LEVEL: &str = "LOGGING_LEVEL";
const ENV_LOGGING_FORMAT: &str = "LOGGING_FORMAT";
const ENV_BIND_ADDR: &str = "SERVER_BIND_ADDR";
const ENV_PORT: &str = "SERVER_PORT";

const LOG_FORMATS: [&str; 4] = ["", "json", "pretty", "text"];

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Where resolved settings were read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    /// The YAML document at this path.
    File(PathBuf),
    /// No document at this path; built-in defaults were used.
    Defaults(PathBuf),
}

impl fmt::Display for SettingsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Defaults(path) => write!(f, "defaults ({} not found)", path.display()),
        }
    }
}

/// Resolved settings plus the document they came from.
///
/// Loading runs before logging is installed, so callers report the source
/// once their subscriber is up.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    /// Validated settings.
    pub settings: Settings,
    /// Document the settings were resolved from.
    pub source: SettingsSource,
}

/// Resolves [`Settings`] from a YAML file and the environment.
#[derive(Clone)]
pub struct SettingsLoader {
    env: EnvLookup,
}

impl SettingsLoader {
    /// Loader reading the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_env(|key| std::env::var(key).ok())
    }

    /// Loader reading variables through `lookup`.
    #[must_use]
    pub fn with_env<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            env: Arc::new(lookup),
        }
    }

    /// Path named by [`CONFIG_PATH_ENV`], or the optional default file.
    ///
    /// The flag is `true` when the path was set explicitly and must exist.
    #[must_use]
    pub fn config_path(&self) -> (PathBuf, bool) {
        self.var(CONFIG_PATH_ENV).map_or_else(
            || (PathBuf::from(DEFAULT_CONFIG_PATH), false),
            |path| (PathBuf::from(path), true),
        )
    }

    /// Resolve settings from the configured file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error when an explicitly configured file cannot be read, when
    /// the document cannot be parsed, or when the resolved settings are invalid.
    pub fn load(&self) -> ConfigResult<LoadedSettings> {
        let (path, required) = self.config_path();
        self.load_from(&path, required)
    }

    /// Resolve settings from `path`; a missing file is tolerated unless `required`.
    ///
    /// # Errors
    ///
    /// See [`SettingsLoader::load`].
    pub fn load_from(&self, path: &Path, required: bool) -> ConfigResult<LoadedSettings> {
        let document = match std::fs::read_to_string(path) {
            Ok(document) => Some(document),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => None,
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let (base, source) = match document {
            Some(document) => (
                parse_document(&document).map_err(|source| ConfigError::Parse {
                    path: Some(path.to_path_buf()),
                    source,
                })?,
                SettingsSource::File(path.to_path_buf()),
            ),
            None => (
                Settings::default(),
                SettingsSource::Defaults(path.to_path_buf()),
            ),
        };
        Ok(LoadedSettings {
            settings: self.finish(base)?,
            source,
        })
    }

    /// Resolve settings from an in-memory YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be parsed or the resolved
    /// settings are invalid.
    pub fn load_str(&self, document: &str) -> ConfigResult<Settings> {
        let base =
            parse_document(document).map_err(|source| ConfigError::Parse { path: None, source })?;
        self.finish(base)
    }

    fn finish(&self, mut settings: Settings) -> ConfigResult<Settings> {
        self.apply_overrides(&mut settings)?;
        validate(&settings)?;
        Ok(settings)
    }

    fn apply_overrides(&self, settings: &mut Settings) -> ConfigResult<()> {
        if let Some(name) = self.var(ENV_APP_NAME) {
            settings.app.name = name;
        }
        if let Some(version) = self.var(ENV_APP_VERSION) {
            settings.app.version = version;
        }
        if let Some(descriptor) = self
            .var(ENV_CONNECTION_STRING)
            .or_else(|| self.var(ENV_CONNECTION_STRING_FALLBACK))
        {
            settings.azure.connection_string = descriptor;
        }
        if let Some(level) = self.var(ENV_LOGGING_LEVEL) {
            settings.logging.level = level;
        }
        if let Some(format) = self.var(ENV_LOGGING_FORMAT) {
            settings.logging.format = format.to_ascii_lowercase();
        }
        if let Some(raw) = self.var(ENV_BIND_ADDR) {
            settings.server.bind_addr =
                raw.parse::<IpAddr>()
                    .map_err(|_| ConfigError::InvalidField {
                        section: "server",
                        field: "bind_addr",
                        value: Some(raw.clone()),
                        reason: "must be an IP address",
                    })?;
        }
        if let Some(raw) = self.var(ENV_PORT) {
            settings.server.port = raw.parse::<u16>().map_err(|_| ConfigError::InvalidField {
                section: "server",
                field: "port",
                value: Some(raw.clone()),
                reason: "must be between 1 and 65535",
            })?;
        }
        Ok(())
    }

    /// Non-empty value of an environment variable.
    fn var(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|value| !value.is_empty())
    }
}

impl fmt::Debug for SettingsLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsLoader").finish_non_exhaustive()
    }
}

fn parse_document(document: &str) -> Result<Settings, serde_yaml::Error> {
    if document.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(document)
}

/// Check resolved settings for values the service cannot run with.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for the first offending field.
pub fn validate(settings: &Settings) -> ConfigResult<()> {
    if settings.app.name.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            section: "app",
            field: "name",
            value: None,
            reason: "must not be empty",
        });
    }
    if settings.server.port == 0 {
        return Err(ConfigError::InvalidField {
            section: "server",
            field: "port",
            value: Some("0".to_string()),
            reason: "must be between 1 and 65535",
        });
    }
    if !LOG_FORMATS.contains(&settings.logging.format.as_str()) {
        return Err(ConfigError::InvalidField {
            section: "logging",
            field: "format",
            value: Some(settings.logging.format.clone()),
            reason: "must be json or pretty",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write as _;
    use std::net::Ipv4Addr;

    use super::*;
    use crate::model::{DEFAULT_APP_NAME, DEFAULT_PORT};

    fn loader(vars: &[(&str, &str)]) -> SettingsLoader {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        SettingsLoader::with_env(move |key| vars.get(key).cloned())
    }

    #[test]
    fn missing_default_file_yields_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yml");
        let loaded = loader(&[]).load_from(&path, false)?;
        assert_eq!(loaded.settings, Settings::default());
        assert_eq!(loaded.settings.app.name, DEFAULT_APP_NAME);
        assert_eq!(loaded.source, SettingsSource::Defaults(path));
        Ok(())
    }

    #[test]
    fn missing_explicit_file_is_an_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = loader(&[]).load_from(&dir.path().join("absent.yml"), true);
        assert!(matches!(result, Err(ConfigError::Read { .. })));
        Ok(())
    }

    #[test]
    fn config_path_honours_environment() {
        assert_eq!(
            loader(&[]).config_path(),
            (PathBuf::from(DEFAULT_CONFIG_PATH), false)
        );
        assert_eq!(
            loader(&[(CONFIG_PATH_ENV, "/etc/lumen.yml")]).config_path(),
            (PathBuf::from("/etc/lumen.yml"), true)
        );
    }

    #[test]
    fn file_values_are_loaded() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "app:\n  name: demo\n  version: 2.0.0\nazure:\n  connection_string: \"InstrumentationKey=abc\"\nserver:\n  port: 9000\n"
        )?;
        let LoadedSettings { settings, source } = loader(&[]).load_from(file.path(), true)?;
        assert_eq!(source, SettingsSource::File(file.path().to_path_buf()));
        assert!(source.to_string().starts_with("file "));
        assert_eq!(settings.app.name, "demo");
        assert_eq!(settings.app.version, "2.0.0");
        assert_eq!(settings.azure.connection_string, "InstrumentationKey=abc");
        assert_eq!(settings.server.port, 9000);
        Ok(())
    }

    #[test]
    fn malformed_file_reports_parse_error_with_path() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "server: [not, a, map]")?;
        match loader(&[]).load_from(file.path(), true) {
            Err(ConfigError::Parse { path, .. }) => {
                assert_eq!(path.as_deref(), Some(file.path()));
            }
            other => anyhow::bail!("expected parse error, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn environment_overrides_file_values() -> anyhow::Result<()> {
        let settings = loader(&[
            ("APP_NAME", "from-env"),
            ("APP_VERSION", "9.9.9"),
            ("AZURE_CONNECTION_STRING", "InstrumentationKey=env"),
            ("LOGGING_LEVEL", "debug"),
            ("LOGGING_FORMAT", "JSON"),
            ("SERVER_BIND_ADDR", "127.0.0.1"),
            ("SERVER_PORT", "3000"),
        ])
        .load_str("app:\n  name: from-file\n")?;
        assert_eq!(settings.app.name, "from-env");
        assert_eq!(settings.app.version, "9.9.9");
        assert_eq!(settings.azure.connection_string, "InstrumentationKey=env");
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, "json");
        assert_eq!(
            settings.server.bind_addr,
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        assert_eq!(settings.server.port, 3000);
        Ok(())
    }

    #[test]
    fn connection_string_falls_back_to_standard_variable() -> anyhow::Result<()> {
        let settings = loader(&[(
            "APPLICATIONINSIGHTS_CONNECTION_STRING",
            "InstrumentationKey=fallback",
        )])
        .load_str("")?;
        assert_eq!(
            settings.azure.connection_string,
            "InstrumentationKey=fallback"
        );

        let settings = loader(&[
            ("AZURE_CONNECTION_STRING", "InstrumentationKey=primary"),
            (
                "APPLICATIONINSIGHTS_CONNECTION_STRING",
                "InstrumentationKey=fallback",
            ),
        ])
        .load_str("")?;
        assert_eq!(
            settings.azure.connection_string,
            "InstrumentationKey=primary"
        );
        Ok(())
    }

    #[test]
    fn empty_environment_values_are_ignored() -> anyhow::Result<()> {
        let settings = loader(&[("APP_NAME", ""), ("SERVER_PORT", "")]).load_str("")?;
        assert_eq!(settings.app.name, DEFAULT_APP_NAME);
        assert_eq!(settings.server.port, DEFAULT_PORT);
        Ok(())
    }

    #[test]
    fn invalid_port_override_is_rejected() {
        let result = loader(&[("SERVER_PORT", "http")]).load_str("");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField { field: "port", .. })
        ));
    }

    #[test]
    fn invalid_bind_addr_override_is_rejected() {
        let result = loader(&[("SERVER_BIND_ADDR", "localhost")]).load_str("");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField {
                field: "bind_addr",
                ..
            })
        ));
    }

    #[test]
    fn validation_rejects_port_zero_and_blank_name() {
        let result = loader(&[]).load_str("server:\n  port: 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField { field: "port", .. })
        ));

        let result = loader(&[]).load_str("app:\n  name: \"  \"\n");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField { field: "name", .. })
        ));
    }

    #[test]
    fn validation_rejects_unknown_log_format() {
        let result = loader(&[("LOGGING_FORMAT", "xml")]).load_str("");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField { field: "format", .. })
        ));
    }
}
