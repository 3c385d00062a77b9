//! One-shot startup decision: enabled or disabled telemetry.
//!
//! # Design
//! - Called once, before the listener is bound; the returned sink never changes.
//! - Never fails: every problem degrades to [`TelemetrySink::Disabled`] plus a warning.
//! - Logs only the redacted key, never the raw descriptor.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::descriptor::{extract_instrumentation_key, redact_key};
use crate::metrics::Metrics;
use crate::sink::{
    TAG_APPLICATION_VERSION, TAG_CLOUD_ROLE, TAG_SDK_VERSION, TelemetryClient, TelemetrySink,
};
use crate::transport::{DEFAULT_TRACK_ENDPOINT, HttpTransport, TelemetryTransport};
use crate::worker;

const SDK_VERSION: &str = concat!("rust-lumen:", env!("CARGO_PKG_VERSION"));

/// Static context stamped on every record.
#[derive(Debug, Clone, Default)]
pub struct TelemetryContext {
    /// Logical service name (`app.name`).
    pub role_name: String,
    /// Service version (`app.version`).
    pub app_version: String,
}

impl TelemetryContext {
    fn tags(&self) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        if !self.role_name.is_empty() {
            tags.insert(TAG_CLOUD_ROLE.to_string(), self.role_name.clone());
        }
        if !self.app_version.is_empty() {
            tags.insert(TAG_APPLICATION_VERSION.to_string(), self.app_version.clone());
        }
        tags.insert(TAG_SDK_VERSION.to_string(), SDK_VERSION.to_string());
        tags
    }
}

/// Queueing and batching knobs for the dispatch worker.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Bounded queue size; records beyond it are dropped.
    pub queue_capacity: usize,
    /// Items per transport call.
    pub max_batch: usize,
    /// Longest time an item waits in a partial batch.
    pub flush_interval: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 1_024,
            max_batch: 64,
            flush_interval: Duration::from_secs(5),
        }
    }
}

/// Decide whether telemetry is enabled and, if so, start the HTTP pipeline
/// bound to the extracted key and [`DEFAULT_TRACK_ENDPOINT`].
#[must_use]
pub fn init_telemetry(
    descriptor: &str,
    context: &TelemetryContext,
    metrics: &Metrics,
) -> TelemetrySink {
    let Some(key) = resolve_key(descriptor) else {
        return TelemetrySink::Disabled;
    };
    match HttpTransport::new(key.clone(), DEFAULT_TRACK_ENDPOINT) {
        Ok(transport) => enable(
            key,
            Arc::new(transport),
            DispatchOptions::default(),
            context,
            metrics,
        ),
        Err(err) => {
            warn!(error = %err, "telemetry transport unavailable; telemetry disabled");
            TelemetrySink::Disabled
        }
    }
}

/// Same decision as [`init_telemetry`] with an injected transport and options.
#[must_use]
pub fn init_telemetry_with(
    descriptor: &str,
    transport: Arc<dyn TelemetryTransport>,
    options: DispatchOptions,
    context: &TelemetryContext,
    metrics: &Metrics,
) -> TelemetrySink {
    resolve_key(descriptor).map_or(TelemetrySink::Disabled, |key| {
        enable(key, transport, options, context, metrics)
    })
}

fn resolve_key(descriptor: &str) -> Option<String> {
    if descriptor.is_empty() {
        warn!("telemetry connection string not configured; telemetry disabled");
        return None;
    }
    let key = extract_instrumentation_key(descriptor);
    if key.is_empty() {
        warn!("connection string has no InstrumentationKey; telemetry disabled");
        return None;
    }
    Some(key)
}

fn enable(
    key: String,
    transport: Arc<dyn TelemetryTransport>,
    options: DispatchOptions,
    context: &TelemetryContext,
    metrics: &Metrics,
) -> TelemetrySink {
    if Handle::try_current().is_err() {
        warn!("no async runtime available for telemetry dispatch; telemetry disabled");
        return TelemetrySink::Disabled;
    }
    let (commands, receiver) = mpsc::channel(options.queue_capacity.max(1));
    let endpoint = transport.destination().to_string();
    let _worker = worker::spawn(receiver, transport, options, metrics.clone());
    info!(
        instrumentation_key = %redact_key(&key),
        endpoint = %endpoint,
        "telemetry enabled"
    );
    TelemetrySink::Enabled(TelemetryClient::new(
        key,
        endpoint,
        context.tags(),
        commands,
        metrics.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::with_operation_id;
    use crate::record::{RequestRecord, TelemetryRecord, properties};
    use crate::sink::TAG_OPERATION_ID;
    use crate::transport::MemoryTransport;

    fn context() -> TelemetryContext {
        TelemetryContext {
            role_name: "lumen".to_string(),
            app_version: "1.2.3".to_string(),
        }
    }

    fn memory_sink(
        descriptor: &str,
        options: DispatchOptions,
    ) -> anyhow::Result<(TelemetrySink, MemoryTransport, Metrics)> {
        let metrics = Metrics::new()?;
        let transport = MemoryTransport::new();
        let sink = init_telemetry_with(
            descriptor,
            Arc::new(transport.clone()),
            options,
            &context(),
            &metrics,
        );
        Ok((sink, transport, metrics))
    }

    #[tokio::test]
    async fn empty_descriptor_disables_telemetry() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        let sink = init_telemetry("", &context(), &metrics);
        assert!(!sink.is_enabled());
        Ok(())
    }

    #[tokio::test]
    async fn descriptor_without_key_disables_telemetry() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        let sink = init_telemetry("Foo=bar", &context(), &metrics);
        assert!(sink.client().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn descriptor_with_key_enables_client() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        let sink = init_telemetry("InstrumentationKey=ABCDEFGH12345", &context(), &metrics);
        let client = sink
            .client()
            .ok_or_else(|| anyhow::anyhow!("expected enabled sink"))?;
        assert_eq!(client.instrumentation_key(), "ABCDEFGH12345");
        assert_eq!(client.endpoint(), DEFAULT_TRACK_ENDPOINT);
        assert!(!format!("{sink:?}").contains("ABCDEFGH12345"));
        Ok(())
    }

    #[test]
    fn missing_runtime_disables_telemetry() -> anyhow::Result<()> {
        let (sink, _, _) = memory_sink("InstrumentationKey=K", DispatchOptions::default())?;
        assert!(!sink.is_enabled());
        Ok(())
    }

    #[tokio::test]
    async fn disabled_sink_never_reaches_transport() -> anyhow::Result<()> {
        let (sink, transport, metrics) = memory_sink("Foo=bar", DispatchOptions::default())?;
        let mut built = false;
        sink.track_event("ignored", || {
            built = true;
            properties([("a", "b")])
        });
        sink.track_metric("ignored", 1.0, crate::record::Properties::new);
        sink.track(TelemetryRecord::Request(RequestRecord::new(
            "GET",
            "/",
            Duration::ZERO,
            200,
        )));
        assert!(sink.flush(Duration::from_secs(1)).await);
        assert!(!built);
        assert_eq!(transport.batches(), 0);
        assert_eq!(metrics.snapshot().records_tracked, 0);
        Ok(())
    }

    #[tokio::test]
    async fn flush_delivers_queued_records_with_tags() -> anyhow::Result<()> {
        let (sink, transport, metrics) =
            memory_sink("A=1;InstrumentationKey=KEY", DispatchOptions::default())?;

        with_operation_id("req-9", async {
            sink.track_event("hello_endpoint_called", || properties([("app_name", "lumen")]));
            sink.track_metric("hello_response_time", 0.01, || {
                properties([("endpoint", "/hello")])
            });
        })
        .await;
        assert!(sink.flush(Duration::from_secs(1)).await);

        let items = transport.items();
        assert_eq!(items.len(), 2);
        for item in &items {
            assert_eq!(item.tags.get(TAG_OPERATION_ID).map(String::as_str), Some("req-9"));
            assert_eq!(item.tags.get(TAG_CLOUD_ROLE).map(String::as_str), Some("lumen"));
            assert_eq!(
                item.tags.get(TAG_APPLICATION_VERSION).map(String::as_str),
                Some("1.2.3")
            );
        }
        assert!(items[0].as_event().is_some());
        assert!(items[1].as_metric().is_some_and(|metric| metric.value >= 0.0));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_tracked, 2);
        assert_eq!(snapshot.batches_sent, 1);
        assert_eq!(snapshot.queue_depth, 0);
        Ok(())
    }

    #[tokio::test]
    async fn request_records_use_their_id_outside_a_request_scope() -> anyhow::Result<()> {
        let (sink, transport, _) = memory_sink("InstrumentationKey=KEY", DispatchOptions::default())?;
        sink.track(TelemetryRecord::Request(
            RequestRecord::new("GET", "/", Duration::ZERO, 200).with_id("standalone"),
        ));
        assert!(sink.flush(Duration::from_secs(1)).await);
        let items = transport.items();
        assert_eq!(
            items[0].tags.get(TAG_OPERATION_ID).map(String::as_str),
            Some("standalone")
        );
        Ok(())
    }

    #[tokio::test]
    async fn full_batches_are_sent_without_flush() -> anyhow::Result<()> {
        let options = DispatchOptions {
            queue_capacity: 16,
            max_batch: 2,
            flush_interval: Duration::from_secs(3_600),
        };
        let (sink, transport, _) = memory_sink("InstrumentationKey=KEY", options)?;
        sink.track_event("one", crate::record::Properties::new);
        sink.track_event("two", crate::record::Properties::new);

        tokio::time::timeout(Duration::from_secs(1), async {
            while transport.items().len() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;
        assert_eq!(transport.batches(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn delivery_failures_are_counted_not_raised() -> anyhow::Result<()> {
        let (sink, transport, metrics) =
            memory_sink("InstrumentationKey=KEY", DispatchOptions::default())?;
        transport.set_failing(true);
        sink.track_event("lost", crate::record::Properties::new);
        assert!(sink.flush(Duration::from_secs(1)).await);
        assert!(transport.items().is_empty());
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.send_failures, 1);
        assert_eq!(snapshot.queue_depth, 0);
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_queue_drops_records() -> anyhow::Result<()> {
        let options = DispatchOptions {
            queue_capacity: 2,
            max_batch: 64,
            flush_interval: Duration::from_secs(3_600),
        };
        let (sink, _transport, metrics) = memory_sink("InstrumentationKey=KEY", options)?;
        // The worker cannot run until this task yields, so the queue fills up.
        for _ in 0..5 {
            sink.track_event("burst", crate::record::Properties::new);
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_tracked, 2);
        assert_eq!(snapshot.records_dropped, 3);
        Ok(())
    }
}
