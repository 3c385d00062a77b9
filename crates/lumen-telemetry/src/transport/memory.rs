use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::TelemetryTransport;
use crate::error::{Result, TelemetryError};
use crate::record::TelemetryItem;

/// In-memory transport that keeps every delivered item.
///
/// Useful for tests and for running the service without a backend. Clones share
/// the same storage.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    items: Mutex<Vec<TelemetryItem>>,
    batches: AtomicUsize,
    failing: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryTransport {
    /// Create an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail with a `503` status instead of storing items.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every subsequent send by `latency`, as a slow backend would.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.inner.latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Items delivered so far, in delivery order.
    #[must_use]
    pub fn items(&self) -> Vec<TelemetryItem> {
        self.inner
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `send` calls, failed ones included.
    #[must_use]
    pub fn batches(&self) -> usize {
        self.inner.batches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetryTransport for MemoryTransport {
    async fn send(&self, batch: &[TelemetryItem]) -> Result<()> {
        self.inner.batches.fetch_add(1, Ordering::SeqCst);
        let latency_ms = self.inner.latency_ms.load(Ordering::SeqCst);
        if latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        }
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(TelemetryError::TransportStatus {
                endpoint: self.destination().to_string(),
                status: 503,
            });
        }
        self.inner
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(batch);
        Ok(())
    }

    fn destination(&self) -> &str {
        "memory"
    }
}
