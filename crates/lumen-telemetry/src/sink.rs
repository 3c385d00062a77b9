//! The telemetry capability handed to middleware and handlers.
//!
//! # Design
//! - `TelemetrySink::Disabled` is a distinct variant, so the no-op path is a match
//!   arm rather than a null check.
//! - Enqueueing is `try_send` on a bounded channel: callers never wait on the
//!   backend, and a full queue drops the record.
//! - Property maps are built lazily so a disabled sink never allocates.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::context::current_operation_id;
use crate::metrics::Metrics;
use crate::record::{EventRecord, MetricRecord, Properties, TelemetryItem, TelemetryRecord};
use crate::worker::Command;

/// Tag carrying the request identifier that correlates records of one request.
pub const TAG_OPERATION_ID: &str = "ai.operation.id";
/// Tag carrying the logical service name.
pub const TAG_CLOUD_ROLE: &str = "ai.cloud.role";
/// Tag carrying the application version.
pub const TAG_APPLICATION_VERSION: &str = "ai.application.ver";
/// Tag identifying the emitting library.
pub const TAG_SDK_VERSION: &str = "ai.internal.sdkVersion";

/// Enabled or disabled telemetry, decided once at startup.
#[derive(Clone, Default)]
pub enum TelemetrySink {
    /// Telemetry is off; every call is a no-op.
    #[default]
    Disabled,
    /// Telemetry is on and bound to one instrumentation key.
    Enabled(TelemetryClient),
}

impl TelemetrySink {
    /// Whether records are being shipped.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }

    /// The enabled client, if any.
    #[must_use]
    pub const fn client(&self) -> Option<&TelemetryClient> {
        match self {
            Self::Enabled(client) => Some(client),
            Self::Disabled => None,
        }
    }

    /// Hand a fully built record to the client.
    pub fn track(&self, record: TelemetryRecord) {
        if let Self::Enabled(client) = self {
            client.track(record);
        }
    }

    /// Emit a custom event; `properties` only runs when enabled.
    pub fn track_event(&self, name: &str, properties: impl FnOnce() -> Properties) {
        if let Self::Enabled(client) = self {
            client.track(TelemetryRecord::Event(EventRecord::new(name, properties())));
        }
    }

    /// Emit a custom metric; `properties` only runs when enabled.
    pub fn track_metric(&self, name: &str, value: f64, properties: impl FnOnce() -> Properties) {
        if let Self::Enabled(client) = self {
            client.track(TelemetryRecord::Metric(MetricRecord::new(
                name,
                value,
                properties(),
            )));
        }
    }

    /// Wait until everything queued so far has been handed to the transport,
    /// giving up after `timeout`. A disabled sink is always flushed.
    pub async fn flush(&self, timeout: Duration) -> bool {
        match self {
            Self::Enabled(client) => client.flush(timeout).await,
            Self::Disabled => true,
        }
    }
}

impl std::fmt::Debug for TelemetrySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("TelemetrySink::Disabled"),
            Self::Enabled(client) => f
                .debug_tuple("TelemetrySink::Enabled")
                .field(client)
                .finish(),
        }
    }
}

/// Handle to an enabled telemetry pipeline. Cheap to clone.
#[derive(Clone)]
pub struct TelemetryClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    instrumentation_key: String,
    endpoint: String,
    tags: BTreeMap<String, String>,
    commands: mpsc::Sender<Command>,
    metrics: Metrics,
}

impl TelemetryClient {
    pub(crate) fn new(
        instrumentation_key: String,
        endpoint: String,
        tags: BTreeMap<String, String>,
        commands: mpsc::Sender<Command>,
        metrics: Metrics,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                instrumentation_key,
                endpoint,
                tags,
                commands,
                metrics,
            }),
        }
    }

    /// Instrumentation key this client is bound to.
    #[must_use]
    pub fn instrumentation_key(&self) -> &str {
        &self.inner.instrumentation_key
    }

    /// Backend destination records are delivered to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Enqueue a record without waiting. Dropped (and counted) when the queue
    /// is full or the worker has stopped.
    pub fn track(&self, record: TelemetryRecord) {
        let kind = record.kind();
        let mut tags = self.inner.tags.clone();
        if let Some(operation_id) = current_operation_id() {
            tags.insert(TAG_OPERATION_ID.to_string(), operation_id.to_string());
        } else if let TelemetryRecord::Request(request) = &record {
            tags.insert(TAG_OPERATION_ID.to_string(), request.id.clone());
        }
        let item = TelemetryItem {
            time: Utc::now(),
            tags,
            record,
        };
        match self.inner.commands.try_send(Command::Track(item)) {
            Ok(()) => self.inner.metrics.inc_record(kind),
            Err(TrySendError::Full(_)) => {
                self.inner.metrics.inc_record_dropped();
                debug!(kind, "telemetry queue full; record dropped");
            }
            Err(TrySendError::Closed(_)) => {
                self.inner.metrics.inc_record_dropped();
                debug!(kind, "telemetry worker stopped; record dropped");
            }
        }
    }

    /// Wait (bounded) for the worker to hand every earlier record to the transport.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let (ack, done) = oneshot::channel();
        let round_trip = async {
            self.inner.commands.send(Command::Flush(ack)).await.ok()?;
            done.await.ok()
        };
        matches!(tokio::time::timeout(timeout, round_trip).await, Ok(Some(())))
    }
}

impl std::fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryClient")
            .field(
                "instrumentation_key",
                &crate::descriptor::redact_key(&self.inner.instrumentation_key),
            )
            .field("endpoint", &self.inner.endpoint)
            .finish_non_exhaustive()
    }
}
