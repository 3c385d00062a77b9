//! Recording telemetry pipelines and record filters.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use lumen_telemetry::{
    DispatchOptions, EventRecord, MemoryTransport, MetricRecord, Metrics, RequestRecord,
    TelemetryContext, TelemetryItem, TelemetrySink, init_telemetry_with,
};

use crate::fixtures::{TEST_APP_NAME, TEST_APP_VERSION, TEST_CONNECTION_STRING};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// A telemetry sink whose deliveries land in memory.
pub struct RecordingTelemetry {
    /// Sink handed to the code under test.
    pub sink: TelemetrySink,
    /// Transport the sink delivers to.
    pub transport: MemoryTransport,
    /// Registry shared with the sink.
    pub metrics: Metrics,
}

impl RecordingTelemetry {
    /// Enabled pipeline bound to [`TEST_CONNECTION_STRING`]. Needs a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics registry cannot be built or no runtime is running.
    pub fn enabled() -> Result<Self> {
        let recording = Self::with_descriptor(TEST_CONNECTION_STRING, DispatchOptions::default())?;
        if !recording.sink.is_enabled() {
            bail!("recording telemetry requires a tokio runtime");
        }
        Ok(recording)
    }

    /// Disabled pipeline; the transport must never be called.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics registry cannot be built.
    pub fn disabled() -> Result<Self> {
        Self::with_descriptor("", DispatchOptions::default())
    }

    /// Pipeline initialised from an arbitrary descriptor and dispatch options.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics registry cannot be built.
    pub fn with_descriptor(descriptor: &str, options: DispatchOptions) -> Result<Self> {
        let metrics = Metrics::new()?;
        let transport = MemoryTransport::new();
        let context = TelemetryContext {
            role_name: TEST_APP_NAME.to_string(),
            app_version: TEST_APP_VERSION.to_string(),
        };
        let sink = init_telemetry_with(
            descriptor,
            Arc::new(transport.clone()),
            options,
            &context,
            &metrics,
        );
        Ok(Self {
            sink,
            transport,
            metrics,
        })
    }

    /// Flush the sink and return everything delivered so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush is not acknowledged in time.
    pub async fn flushed_items(&self) -> Result<Vec<TelemetryItem>> {
        if !self.sink.flush(FLUSH_TIMEOUT).await {
            bail!("telemetry flush was not acknowledged within {FLUSH_TIMEOUT:?}");
        }
        Ok(self.transport.items())
    }
}

/// Request records among `items`.
#[must_use]
pub fn requests(items: &[TelemetryItem]) -> Vec<&RequestRecord> {
    items.iter().filter_map(TelemetryItem::as_request).collect()
}

/// Event records among `items`.
#[must_use]
pub fn events(items: &[TelemetryItem]) -> Vec<&EventRecord> {
    items.iter().filter_map(TelemetryItem::as_event).collect()
}

/// Metric records among `items`.
#[must_use]
pub fn metrics(items: &[TelemetryItem]) -> Vec<&MetricRecord> {
    items.iter().filter_map(TelemetryItem::as_metric).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_telemetry::properties;

    #[tokio::test]
    async fn enabled_recording_captures_events() -> Result<()> {
        let recording = RecordingTelemetry::enabled()?;
        recording
            .sink
            .track_event("sample", || properties([("k", "v")]));
        let items = recording.flushed_items().await?;
        assert_eq!(events(&items).len(), 1);
        assert!(requests(&items).is_empty());
        assert!(metrics(&items).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn disabled_recording_never_delivers() -> Result<()> {
        let recording = RecordingTelemetry::disabled()?;
        recording
            .sink
            .track_event("sample", lumen_telemetry::Properties::new);
        assert!(recording.flushed_items().await?.is_empty());
        assert_eq!(recording.transport.batches(), 0);
        Ok(())
    }
}
