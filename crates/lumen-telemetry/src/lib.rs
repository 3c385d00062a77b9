#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Telemetry primitives shared across the Lumen workspace.
//!
//! This crate owns logging setup, the Prometheus registry, and the telemetry
//! pipeline that ships request, event, and metric records to an Application
//! Insights compatible ingestion endpoint.

pub mod context;
pub mod descriptor;
pub mod error;
pub mod init;
pub mod lifecycle;
pub mod metrics;
pub mod record;
pub mod sink;
pub mod transport;
mod worker;

pub use context::{current_operation_id, record_request_span, with_operation_id};
pub use descriptor::{extract_instrumentation_key, redact_key};
pub use error::{Result, TelemetryError};
pub use init::{LogFormat, LoggingConfig, build_sha, init_logging};
pub use lifecycle::{DispatchOptions, TelemetryContext, init_telemetry, init_telemetry_with};
pub use metrics::{Metrics, MetricsSnapshot};
pub use record::{
    EventRecord, MetricRecord, Properties, RequestRecord, TelemetryItem, TelemetryRecord,
    properties,
};
pub use sink::{TelemetryClient, TelemetrySink};
pub use transport::{DEFAULT_TRACK_ENDPOINT, HttpTransport, MemoryTransport, TelemetryTransport};
