//! Error types for telemetry operations.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use prometheus::Error as PrometheusError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug)]
pub enum TelemetryError {
    /// Installing the tracing subscriber failed.
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// Building a Prometheus collector failed.
    MetricsCollector {
        /// Metric identifier tied to the failure.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Registering a Prometheus collector failed.
    MetricsRegister {
        /// Metric identifier tied to the failure.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Encoding Prometheus metrics failed.
    MetricsEncode {
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Rendered metrics output was not valid UTF-8.
    MetricsUtf8 {
        /// Underlying UTF-8 conversion error.
        source: std::string::FromUtf8Error,
    },
    /// Building the HTTP client for the ingestion endpoint failed.
    TransportBuild {
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// Sending a batch to the ingestion endpoint failed before a response arrived.
    TransportRequest {
        /// Endpoint the batch was posted to.
        endpoint: String,
        /// Number of items in the failed batch.
        items: usize,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The ingestion endpoint answered with a non-success status.
    TransportStatus {
        /// Endpoint the batch was posted to.
        endpoint: String,
        /// HTTP status returned by the endpoint.
        status: u16,
    },
    /// Serialising telemetry envelopes failed.
    EnvelopeEncode {
        /// Underlying serde error.
        source: serde_json::Error,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriberInstall { .. } => {
                formatter.write_str("failed to install tracing subscriber")
            }
            Self::MetricsCollector { .. } => {
                formatter.write_str("failed to build metrics collector")
            }
            Self::MetricsRegister { .. } => {
                formatter.write_str("failed to register metrics collector")
            }
            Self::MetricsEncode { .. } => formatter.write_str("failed to encode metrics"),
            Self::MetricsUtf8 { .. } => formatter.write_str("metrics output was not valid utf-8"),
            Self::TransportBuild { .. } => {
                formatter.write_str("failed to build telemetry transport")
            }
            Self::TransportRequest { .. } => {
                formatter.write_str("failed to send telemetry batch")
            }
            Self::TransportStatus { .. } => {
                formatter.write_str("telemetry endpoint rejected batch")
            }
            Self::EnvelopeEncode { .. } => {
                formatter.write_str("failed to encode telemetry envelopes")
            }
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SubscriberInstall { source } => Some(source),
            Self::MetricsCollector { source, .. }
            | Self::MetricsRegister { source, .. }
            | Self::MetricsEncode { source } => Some(source),
            Self::MetricsUtf8 { source } => Some(source),
            Self::TransportBuild { source } | Self::TransportRequest { source, .. } => {
                Some(source)
            }
            Self::TransportStatus { .. } => None,
            Self::EnvelopeEncode { source } => Some(source),
        }
    }
}
