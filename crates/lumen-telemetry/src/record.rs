//! Immutable telemetry records handed to the sink.
//!
//! # Design
//! - Records are plain data; construction never touches the network.
//! - Every variant carries a string-to-string property map.
//! - [`TelemetryItem`] adds capture time and context tags once a record is accepted.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// String properties attached to a record.
pub type Properties = BTreeMap<String, String>;

/// One unit of telemetry.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryRecord {
    /// An inbound HTTP request observed by the middleware.
    Request(RequestRecord),
    /// A named custom event.
    Event(EventRecord),
    /// A named numeric measurement.
    Metric(MetricRecord),
}

impl TelemetryRecord {
    /// Short discriminator used for metric labels and envelope names.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Event(_) => "event",
            Self::Metric(_) => "metric",
        }
    }
}

/// Request telemetry produced once per inbound HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    /// Request identifier (propagated `x-request-id` or generated).
    pub id: String,
    /// HTTP method.
    pub method: String,
    /// Request URL as received (path and query).
    pub url: String,
    /// Time spent in the downstream handler chain.
    pub duration: Duration,
    /// Numeric HTTP status of the produced response.
    pub status: u16,
    /// Request properties (`route`, `user_agent`, `app_version`).
    pub properties: Properties,
}

impl RequestRecord {
    /// Build a request record with a fresh identifier and no properties.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        duration: Duration,
        status: u16,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            method: method.into(),
            url: url.into(),
            duration,
            status,
            properties: Properties::new(),
        }
    }

    /// Replace the request identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Status code rendered the way the backend expects it.
    #[must_use]
    pub fn response_code(&self) -> String {
        self.status.to_string()
    }

    /// Whether the request counts as successful: any status below 400, plus 401
    /// which is an expected challenge rather than a failure.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.status < 400 || self.status == 401
    }

    /// Operation name: method plus the URL path without query or fragment.
    #[must_use]
    pub fn operation_name(&self) -> String {
        let path = self
            .url
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        format!("{} {}", self.method, path)
    }
}

/// Custom event telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Event name.
    pub name: String,
    /// Event properties.
    pub properties: Properties,
}

impl EventRecord {
    /// Build an event record with the given properties.
    #[must_use]
    pub fn new(name: impl Into<String>, properties: Properties) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }
}

/// Custom metric telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    /// Metric name.
    pub name: String,
    /// Measured value.
    pub value: f64,
    /// Metric properties.
    pub properties: Properties,
}

impl MetricRecord {
    /// Build a metric record with the given properties.
    #[must_use]
    pub fn new(name: impl Into<String>, value: f64, properties: Properties) -> Self {
        Self {
            name: name.into(),
            value,
            properties,
        }
    }
}

/// Build a [`Properties`] map from borrowed pairs.
#[must_use]
pub fn properties<K, V, I>(pairs: I) -> Properties
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// A record accepted by an enabled client, stamped with capture time and tags.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryItem {
    /// When the record was accepted.
    pub time: DateTime<Utc>,
    /// Context tags (`ai.cloud.role`, `ai.operation.id`, ...).
    pub tags: BTreeMap<String, String>,
    /// The record itself.
    pub record: TelemetryRecord,
}

impl TelemetryItem {
    /// Request record carried by this item, if any.
    #[must_use]
    pub const fn as_request(&self) -> Option<&RequestRecord> {
        match &self.record {
            TelemetryRecord::Request(record) => Some(record),
            _ => None,
        }
    }

    /// Event record carried by this item, if any.
    #[must_use]
    pub const fn as_event(&self) -> Option<&EventRecord> {
        match &self.record {
            TelemetryRecord::Event(record) => Some(record),
            _ => None,
        }
    }

    /// Metric record carried by this item, if any.
    #[must_use]
    pub const fn as_metric(&self) -> Option<&MetricRecord> {
        match &self.record {
            TelemetryRecord::Metric(record) => Some(record),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_follows_status_rules() {
        let ok = RequestRecord::new("GET", "/", Duration::ZERO, 204);
        let challenge = RequestRecord::new("GET", "/", Duration::ZERO, 401);
        let missing = RequestRecord::new("GET", "/", Duration::ZERO, 404);
        let failed = RequestRecord::new("GET", "/", Duration::ZERO, 500);
        assert!(ok.success());
        assert!(challenge.success());
        assert!(!missing.success());
        assert!(!failed.success());
        assert_eq!(failed.response_code(), "500");
    }

    #[test]
    fn operation_name_strips_query_and_fragment() {
        let record = RequestRecord::new(
            "GET",
            "/api/v1/hello?name=x#top",
            Duration::from_millis(3),
            200,
        );
        assert_eq!(record.operation_name(), "GET /api/v1/hello");
    }

    #[test]
    fn builders_attach_id_and_properties() {
        let record = RequestRecord::new("POST", "/x", Duration::ZERO, 201)
            .with_id("req-1")
            .with_property("route", "/x");
        assert_eq!(record.id, "req-1");
        assert_eq!(record.properties.get("route").map(String::as_str), Some("/x"));

        let wrapped = TelemetryRecord::Request(record);
        assert_eq!(wrapped.kind(), "request");
    }

    #[test]
    fn properties_helper_collects_pairs() {
        let props = properties([("app_name", "lumen"), ("version", "1.0.0")]);
        assert_eq!(props.len(), 2);
        assert_eq!(props["version"], "1.0.0");

        let event = TelemetryRecord::Event(EventRecord::new("started", props.clone()));
        let metric = TelemetryRecord::Metric(MetricRecord::new("latency", 0.5, props));
        assert_eq!(event.kind(), "event");
        assert_eq!(metric.kind(), "metric");
    }
}
