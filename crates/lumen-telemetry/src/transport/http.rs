use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, warn};

use super::TelemetryTransport;
use super::envelope::encode_batch;
use crate::error::{Result, TelemetryError};
use crate::record::TelemetryItem;

/// Ingestion endpoint every enabled client posts to.
pub const DEFAULT_TRACK_ENDPOINT: &str = "https://dc.applicationinsights.azure.com/v2/track";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts JSON envelope batches to a `v2/track` endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    instrumentation_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackResponse {
    items_received: usize,
    items_accepted: usize,
    #[serde(default)]
    errors: Vec<TrackError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackError {
    index: usize,
    status_code: u16,
    #[serde(default)]
    message: String,
}

impl TrackResponse {
    /// Log rejected items at `warn`; returns how many the backend refused.
    fn report_rejections(&self) -> usize {
        let rejected = self
            .errors
            .len()
            .max(self.items_received.saturating_sub(self.items_accepted));
        if rejected == 0 {
            return 0;
        }
        for error in &self.errors {
            debug!(
                index = error.index,
                status = error.status_code,
                message = %error.message,
                "telemetry item rejected"
            );
        }
        warn!(
            received = self.items_received,
            accepted = self.items_accepted,
            rejected,
            "telemetry batch partially accepted"
        );
        rejected
    }
}

impl HttpTransport {
    /// Build a transport bound to an instrumentation key and endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client (TLS backend) cannot be built.
    pub fn new(instrumentation_key: impl Into<String>, endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("lumen-telemetry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| TelemetryError::TransportBuild { source })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            instrumentation_key: instrumentation_key.into(),
        })
    }
}

#[async_trait]
impl TelemetryTransport for HttpTransport {
    async fn send(&self, batch: &[TelemetryItem]) -> Result<()> {
        let body = encode_batch(&self.instrumentation_key, batch)?;
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| TelemetryError::TransportRequest {
                endpoint: self.endpoint.clone(),
                items: batch.len(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::TransportStatus {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }
        if status == StatusCode::OK || status == StatusCode::PARTIAL_CONTENT {
            match response.json::<TrackResponse>().await {
                Ok(summary) => {
                    summary.report_rejections();
                }
                Err(err) => {
                    debug!(status = status.as_u16(), error = %err, "unreadable track response");
                }
            }
        }
        Ok(())
    }

    fn destination(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_response_parses_partial_acceptance() -> anyhow::Result<()> {
        let body = r#"{"itemsReceived":3,"itemsAccepted":2,"errors":[{"index":1,"statusCode":400,"message":"bad"}]}"#;
        let parsed: TrackResponse = serde_json::from_str(body)?;
        assert_eq!(parsed.items_received, 3);
        assert_eq!(parsed.items_accepted, 2);
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].index, 1);
        assert_eq!(parsed.errors[0].status_code, 400);
        assert_eq!(parsed.report_rejections(), 1);
        Ok(())
    }

    #[test]
    fn ok_response_bodies_are_checked_for_rejections() -> anyhow::Result<()> {
        let clean: TrackResponse =
            serde_json::from_str(r#"{"itemsReceived":2,"itemsAccepted":2,"errors":[]}"#)?;
        assert_eq!(clean.report_rejections(), 0);

        let short: TrackResponse =
            serde_json::from_str(r#"{"itemsReceived":4,"itemsAccepted":1}"#)?;
        assert!(short.errors.is_empty());
        assert_eq!(short.report_rejections(), 3);
        Ok(())
    }

    #[test]
    fn transport_reports_its_destination() -> anyhow::Result<()> {
        let transport = HttpTransport::new("key", DEFAULT_TRACK_ENDPOINT)?;
        assert_eq!(transport.destination(), DEFAULT_TRACK_ENDPOINT);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_endpoint_surfaces_request_error() -> anyhow::Result<()> {
        let transport = HttpTransport::new("key", "http://127.0.0.1:9/v2/track")?;
        let batch = vec![TelemetryItem {
            time: chrono::Utc::now(),
            tags: std::collections::BTreeMap::new(),
            record: crate::record::TelemetryRecord::Event(crate::record::EventRecord::new(
                "unreachable",
                crate::record::Properties::new(),
            )),
        }];
        let err = transport
            .send(&batch)
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected a delivery failure"))?;
        assert!(matches!(
            err,
            TelemetryError::TransportRequest { items: 1, .. }
        ));
        Ok(())
    }
}
