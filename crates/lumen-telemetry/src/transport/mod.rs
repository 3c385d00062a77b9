//! Delivery of telemetry batches to an ingestion backend.
//!
//! # Design
//! - The dispatch worker is the only caller; request paths never await a transport.
//! - Implementations report failures and never retry; the worker decides what to log.

use async_trait::async_trait;

use crate::error::Result;
use crate::record::TelemetryItem;

pub mod envelope;
mod http;
mod memory;

pub use http::{DEFAULT_TRACK_ENDPOINT, HttpTransport};
pub use memory::MemoryTransport;

/// Backend that accepts batches of telemetry items.
#[async_trait]
pub trait TelemetryTransport: Send + Sync {
    /// Deliver one batch. Called with a non-empty slice.
    async fn send(&self, batch: &[TelemetryItem]) -> Result<()>;

    /// Human readable destination, used in logs.
    fn destination(&self) -> &str;
}
