//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Describes the HTTP surface and the health of the telemetry pipeline itself,
//!   so dropped or failed deliveries are visible even when the backend is not.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    records_total: IntCounterVec,
    records_dropped_total: IntCounter,
    batches_sent_total: IntCounter,
    send_failures_total: IntCounter,
    queue_depth: IntGauge,
}

/// Snapshot of the telemetry pipeline counters for health reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Records accepted into the dispatch queue.
    pub records_tracked: u64,
    /// Records discarded because the queue was full or closed.
    pub records_dropped: u64,
    /// Batches handed to the transport successfully.
    pub batches_sent: u64,
    /// Batches the transport failed to deliver.
    pub send_failures: u64,
    /// Records currently waiting in the dispatch queue.
    pub queue_depth: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["route", "code"],
        )
        .map_err(|source| collector("http_requests_total", source))?;
        let records_total = IntCounterVec::new(
            Opts::new(
                "telemetry_records_total",
                "Telemetry records accepted for delivery by kind",
            ),
            &["kind"],
        )
        .map_err(|source| collector("telemetry_records_total", source))?;
        let records_dropped_total = IntCounter::with_opts(Opts::new(
            "telemetry_records_dropped_total",
            "Telemetry records dropped because the dispatch queue was unavailable",
        ))
        .map_err(|source| collector("telemetry_records_dropped_total", source))?;
        let batches_sent_total = IntCounter::with_opts(Opts::new(
            "telemetry_batches_sent_total",
            "Telemetry batches delivered to the ingestion endpoint",
        ))
        .map_err(|source| collector("telemetry_batches_sent_total", source))?;
        let send_failures_total = IntCounter::with_opts(Opts::new(
            "telemetry_send_failures_total",
            "Telemetry batches that failed to deliver",
        ))
        .map_err(|source| collector("telemetry_send_failures_total", source))?;
        let queue_depth = IntGauge::with_opts(Opts::new(
            "telemetry_queue_depth",
            "Telemetry records waiting for dispatch",
        ))
        .map_err(|source| collector("telemetry_queue_depth", source))?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "telemetry_records_total", &records_total)?;
        register(
            &registry,
            "telemetry_records_dropped_total",
            &records_dropped_total,
        )?;
        register(&registry, "telemetry_batches_sent_total", &batches_sent_total)?;
        register(
            &registry,
            "telemetry_send_failures_total",
            &send_failures_total,
        )?;
        register(&registry, "telemetry_queue_depth", &queue_depth)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                records_total,
                records_dropped_total,
                batches_sent_total,
                send_failures_total,
                queue_depth,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count a record accepted into the dispatch queue.
    pub fn inc_record(&self, kind: &str) {
        self.inner.records_total.with_label_values(&[kind]).inc();
        self.inner.queue_depth.inc();
    }

    /// Count a record that could not be queued.
    pub fn inc_record_dropped(&self) {
        self.inner.records_dropped_total.inc();
    }

    /// Record that a batch of `items` left the queue and was delivered.
    pub fn observe_batch_sent(&self, items: usize) {
        self.inner.batches_sent_total.inc();
        self.drain_queue(items);
    }

    /// Record that a batch of `items` left the queue and failed to deliver.
    pub fn observe_batch_failed(&self, items: usize) {
        self.inner.send_failures_total.inc();
        self.drain_queue(items);
    }

    fn drain_queue(&self, items: usize) {
        self.inner
            .queue_depth
            .sub(i64::try_from(items).unwrap_or(i64::MAX));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the telemetry pipeline counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let records_tracked = ["request", "event", "metric"]
            .iter()
            .map(|kind| self.inner.records_total.with_label_values(&[*kind]).get())
            .sum();
        MetricsSnapshot {
            records_tracked,
            records_dropped: self.inner.records_dropped_total.get(),
            batches_sent: self.inner.batches_sent_total.get(),
            send_failures: self.inner.send_failures_total.get(),
            queue_depth: self.inner.queue_depth.get(),
        }
    }
}

const fn collector(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsCollector { name, source }
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/health", 200);
        metrics.inc_record("request");
        metrics.inc_record("event");
        metrics.inc_record("metric");
        metrics.inc_record_dropped();
        metrics.observe_batch_sent(2);
        metrics.observe_batch_failed(1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_tracked, 3);
        assert_eq!(snapshot.records_dropped, 1);
        assert_eq!(snapshot.batches_sent, 1);
        assert_eq!(snapshot.send_failures, 1);
        assert_eq!(snapshot.queue_depth, 0);

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("telemetry_records_total"));
        assert!(rendered.contains("telemetry_records_dropped_total"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> anyhow::Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.inc_record_dropped();
        assert_eq!(first.snapshot().records_dropped, 1);
        assert_eq!(second.snapshot().records_dropped, 0);
        Ok(())
    }
}
