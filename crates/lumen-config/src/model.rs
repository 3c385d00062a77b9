//! Typed settings consumed by the service.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// Default logical service name.
pub const DEFAULT_APP_NAME: &str = "lumen";
/// Default service version.
pub const DEFAULT_APP_VERSION: &str = "1.0.0";
/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Application identity.
    pub app: AppSettings,
    /// Telemetry backend settings.
    pub azure: AzureSettings,
    /// Logging output settings.
    pub logging: LoggingSettings,
    /// HTTP listener settings.
    pub server: ServerSettings,
}

/// Application identity reported in responses and telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppSettings {
    /// Logical service name.
    pub name: String,
    /// Service version string.
    pub version: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_APP_NAME.to_string(),
            version: DEFAULT_APP_VERSION.to_string(),
        }
    }
}

/// Telemetry backend settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AzureSettings {
    /// Connection descriptor; empty disables telemetry.
    pub connection_string: String,
}

impl std::fmt::Debug for AzureSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.connection_string.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("AzureSettings")
            .field("connection_string", &shown)
            .finish()
    }
}

/// Logging output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Level directive used when `RUST_LOG` is unset.
    pub level: String,
    /// `json`, `pretty`, or empty to infer from the build profile.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: String::new(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// Interface to bind.
    pub bind_addr: IpAddr,
    /// TCP port to bind.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }
}
