//! HTTP surface modules (router, handlers, middleware).

/// Shared constants and header names.
pub mod constants;
/// Demo business endpoints carrying telemetry instrumentation points.
pub mod demo;
/// Problem response helpers and error types.
pub mod errors;
/// Health and diagnostics endpoints.
pub mod health;
/// Router construction and server host.
pub mod router;
/// Request telemetry middleware.
pub mod telemetry;
