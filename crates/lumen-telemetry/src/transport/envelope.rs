//! Wire encoding for the `v2/track` ingestion endpoint.
//!
//! Each item becomes one envelope:
//! `{"name", "time", "iKey", "tags", "data": {"baseType", "baseData"}}`.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::SecondsFormat;
use serde::Serialize;

use crate::error::{Result, TelemetryError};
use crate::record::{Properties, TelemetryItem, TelemetryRecord};

const SCHEMA_VERSION: u8 = 2;
const ENVELOPE_PREFIX: &str = "Microsoft.ApplicationInsights";
/// `DataPointType::Measurement` in the ingestion schema.
const DATA_POINT_MEASUREMENT: u8 = 0;

/// One serialisable envelope borrowing from the item it describes.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    name: String,
    time: String,
    #[serde(rename = "iKey")]
    instrumentation_key: &'a str,
    tags: &'a BTreeMap<String, String>,
    data: EnvelopeData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeData<'a> {
    base_type: &'static str,
    base_data: BaseData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BaseData<'a> {
    Request(RequestData<'a>),
    Event(EventData<'a>),
    Metric(MetricData<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestData<'a> {
    ver: u8,
    id: &'a str,
    name: String,
    duration: String,
    response_code: String,
    success: bool,
    url: &'a str,
    properties: &'a Properties,
}

#[derive(Debug, Serialize)]
struct EventData<'a> {
    ver: u8,
    name: &'a str,
    properties: &'a Properties,
}

#[derive(Debug, Serialize)]
struct MetricData<'a> {
    ver: u8,
    metrics: [DataPoint<'a>; 1],
    properties: &'a Properties,
}

#[derive(Debug, Serialize)]
struct DataPoint<'a> {
    name: &'a str,
    kind: u8,
    value: f64,
    count: u32,
}

/// Build the envelope for a single item.
#[must_use]
pub fn to_envelope<'a>(instrumentation_key: &'a str, item: &'a TelemetryItem) -> Envelope<'a> {
    let (suffix, base_type, base_data) = match &item.record {
        TelemetryRecord::Request(record) => (
            "Request",
            "RequestData",
            BaseData::Request(RequestData {
                ver: SCHEMA_VERSION,
                id: &record.id,
                name: record.operation_name(),
                duration: format_duration(record.duration),
                response_code: record.response_code(),
                success: record.success(),
                url: &record.url,
                properties: &record.properties,
            }),
        ),
        TelemetryRecord::Event(record) => (
            "Event",
            "EventData",
            BaseData::Event(EventData {
                ver: SCHEMA_VERSION,
                name: &record.name,
                properties: &record.properties,
            }),
        ),
        TelemetryRecord::Metric(record) => (
            "Metric",
            "MetricData",
            BaseData::Metric(MetricData {
                ver: SCHEMA_VERSION,
                metrics: [DataPoint {
                    name: &record.name,
                    kind: DATA_POINT_MEASUREMENT,
                    value: record.value,
                    count: 1,
                }],
                properties: &record.properties,
            }),
        ),
    };

    Envelope {
        name: format!(
            "{ENVELOPE_PREFIX}.{}.{suffix}",
            instrumentation_key.replace('-', "")
        ),
        time: item.time.to_rfc3339_opts(SecondsFormat::Micros, true),
        instrumentation_key,
        tags: &item.tags,
        data: EnvelopeData {
            base_type,
            base_data,
        },
    }
}

/// Encode a batch as a JSON array of envelopes.
///
/// # Errors
///
/// Returns an error if serialisation fails.
pub fn encode_batch(instrumentation_key: &str, batch: &[TelemetryItem]) -> Result<Vec<u8>> {
    let envelopes: Vec<Envelope<'_>> = batch
        .iter()
        .map(|item| to_envelope(instrumentation_key, item))
        .collect();
    serde_json::to_vec(&envelopes).map_err(|source| TelemetryError::EnvelopeEncode { source })
}

/// Format a duration as `d.hh:mm:ss.fffffff` (100ns ticks).
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let ticks = duration.subsec_nanos() / 100;
    let days = total_secs / 86_400;
    let hours = (total_secs / 3_600) % 24;
    let minutes = (total_secs / 60) % 60;
    let seconds = total_secs % 60;
    format!("{days}.{hours:02}:{minutes:02}:{seconds:02}.{ticks:07}")
}
