//! # Design
//!
//! - Centralize application-level errors for bootstrap.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: lumen_config::ConfigError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: lumen_api::ApiServerError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: lumen_telemetry::TelemetryError,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: lumen_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: lumen_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: lumen_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "settings.load",
            lumen_config::ConfigError::InvalidField {
                section: "server",
                field: "port",
                value: Some("0".to_string()),
                reason: "must be between 1 and 65535",
            },
        );
        assert!(matches!(
            config,
            AppError::Config {
                operation: "settings.load",
                ..
            }
        ));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());

        let api = AppError::api_server(
            "api_server.serve",
            lumen_api::ApiServerError::Serve {
                source: io::Error::other("reset"),
            },
        );
        assert!(matches!(api, AppError::ApiServer { .. }));
        assert!(api.source().is_some());

        let telemetry = AppError::telemetry(
            "telemetry.metrics",
            lumen_telemetry::TelemetryError::TransportStatus {
                endpoint: "memory".to_string(),
                status: 503,
            },
        );
        assert_eq!(telemetry.to_string(), "telemetry operation failed");
    }
}
