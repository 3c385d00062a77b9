//! Error types for configuration loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file")]
    Read {
        /// Path that was being read.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The configuration document was not valid YAML for [`crate::Settings`].
    #[error("failed to parse configuration document")]
    Parse {
        /// Path of the document, when it came from disk.
        path: Option<PathBuf>,
        /// Source parse error.
        source: serde_yaml::Error,
    },
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
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn read_error_keeps_source() {
        let err = ConfigError::Read {
            path: PathBuf::from("missing.yml"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.to_string(), "failed to read configuration file");
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_field_message_is_constant() {
        let err = ConfigError::InvalidField {
            section: "server",
            field: "port",
            value: Some("0".to_string()),
            reason: "must be between 1 and 65535",
        };
        assert_eq!(err.to_string(), "invalid configuration field");
        assert!(err.source().is_none());
    }
}
