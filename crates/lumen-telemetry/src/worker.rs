//! Background dispatch worker draining the bounded telemetry queue.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::lifecycle::DispatchOptions;
use crate::metrics::Metrics;
use crate::record::TelemetryItem;
use crate::transport::TelemetryTransport;

/// Messages accepted by the worker, processed in arrival order.
pub(crate) enum Command {
    Track(TelemetryItem),
    Flush(oneshot::Sender<()>),
}

pub(crate) fn spawn(
    mut commands: mpsc::Receiver<Command>,
    transport: Arc<dyn TelemetryTransport>,
    options: DispatchOptions,
    metrics: Metrics,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut worker = Worker {
            buffer: Vec::with_capacity(options.max_batch),
            max_batch: options.max_batch.max(1),
            transport,
            metrics,
        };
        let mut ticker = tokio::time::interval_at(
            Instant::now() + options.flush_interval,
            options.flush_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(Command::Track(item)) => worker.push(item).await,
                        Some(Command::Flush(ack)) => {
                            worker.dispatch().await;
                            let _ = ack.send(());
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => worker.dispatch().await,
            }
        }
        worker.dispatch().await;
        debug!("telemetry dispatch worker stopped");
    })
}

struct Worker {
    buffer: Vec<TelemetryItem>,
    max_batch: usize,
    transport: Arc<dyn TelemetryTransport>,
    metrics: Metrics,
}

impl Worker {
    async fn push(&mut self, item: TelemetryItem) {
        self.buffer.push(item);
        if self.buffer.len() >= self.max_batch {
            self.dispatch().await;
        }
    }

    async fn dispatch(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.buffer);
        let items = batch.len();
        match self.transport.send(&batch).await {
            Ok(()) => {
                self.metrics.observe_batch_sent(items);
                debug!(items, destination = self.transport.destination(), "telemetry batch sent");
            }
            Err(err) => {
                self.metrics.observe_batch_failed(items);
                warn!(
                    error = %err,
                    items,
                    destination = self.transport.destination(),
                    "telemetry batch delivery failed"
                );
            }
        }
    }
}
