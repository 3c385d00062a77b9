//! Health and diagnostics endpoints.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, Uri},
    response::Response,
};
use lumen_telemetry::build_sha;
use serde::Serialize;
use tracing::error;

use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) app: String,
    pub(crate) version: String,
    pub(crate) build: &'static str,
    pub(crate) telemetry: TelemetryHealth,
}

#[derive(Debug, Serialize)]
pub(crate) struct TelemetryHealth {
    pub(crate) enabled: bool,
    pub(crate) records_tracked: u64,
    pub(crate) records_dropped: u64,
    pub(crate) send_failures: u64,
}

pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let snapshot = state.metrics.snapshot();
    Json(HealthResponse {
        status: "ok",
        app: state.settings.app.name.clone(),
        version: state.settings.app.version.clone(),
        build: build_sha(),
        telemetry: TelemetryHealth {
            enabled: state.telemetry.is_enabled(),
            records_tracked: snapshot.records_tracked,
            records_dropped: snapshot.records_dropped,
            send_failures: snapshot.send_failures,
        },
    })
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.metrics.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "failed to build metrics response");
                ApiError::internal("failed to build metrics response")
            }),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}

pub(crate) async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("no route for {}", uri.path()))
}
