//! Demo business endpoints with their telemetry instrumentation points.
//!
//! Each handler emits one event before building its response and one metric
//! with the handler-local elapsed time afterwards. Both are no-ops when
//! telemetry is disabled.

use std::sync::Arc;
use std::time::Instant;

use axum::{Json, extract::State};
use chrono::Utc;
use lumen_telemetry::{properties, redact_key};
use serde::Serialize;

use crate::http::constants::{
    EVENT_CONFIG_ACCESSED, EVENT_HELLO_CALLED, HELLO_WORK, METRIC_CONFIG_RESPONSE_TIME,
    METRIC_HELLO_RESPONSE_TIME,
};
use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub(crate) struct HelloResponse {
    pub(crate) message: &'static str,
    pub(crate) app_name: String,
    pub(crate) version: String,
    /// Unix seconds.
    pub(crate) timestamp: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ConfigResponse {
    pub(crate) app: AppInfo,
    pub(crate) telemetry: TelemetryInfo,
}

#[derive(Debug, Serialize)]
pub(crate) struct AppInfo {
    pub(crate) name: String,
    pub(crate) version: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TelemetryInfo {
    pub(crate) enabled: bool,
    /// Redacted; empty when telemetry is disabled.
    pub(crate) instrumentation_key: String,
}

pub(crate) async fn hello(State(state): State<Arc<ApiState>>) -> Json<HelloResponse> {
    let started = Instant::now();
    let app = &state.settings.app;
    state.telemetry.track_event(EVENT_HELLO_CALLED, || {
        properties([
            ("app_name", app.name.as_str()),
            ("version", app.version.as_str()),
        ])
    });

    tokio::time::sleep(HELLO_WORK).await;

    let response = HelloResponse {
        message: "Ok",
        app_name: app.name.clone(),
        version: app.version.clone(),
        timestamp: Utc::now().timestamp(),
    };

    state.telemetry.track_metric(
        METRIC_HELLO_RESPONSE_TIME,
        started.elapsed().as_secs_f64(),
        || properties([("endpoint", "/hello")]),
    );
    Json(response)
}

pub(crate) async fn config(State(state): State<Arc<ApiState>>) -> Json<ConfigResponse> {
    let started = Instant::now();
    state
        .telemetry
        .track_event(EVENT_CONFIG_ACCESSED, || properties([("debug_mode", "true")]));

    let app = &state.settings.app;
    let response = ConfigResponse {
        app: AppInfo {
            name: app.name.clone(),
            version: app.version.clone(),
        },
        telemetry: TelemetryInfo {
            enabled: state.telemetry.is_enabled(),
            instrumentation_key: state
                .telemetry
                .client()
                .map(|client| redact_key(client.instrumentation_key()))
                .unwrap_or_default(),
        },
    };

    state.telemetry.track_metric(
        METRIC_CONFIG_RESPONSE_TIME,
        started.elapsed().as_secs_f64(),
        || properties([("endpoint", "/config")]),
    );
    Json(response)
}
