//! Shared application state handed to the middleware and every handler.

use lumen_config::Settings;
use lumen_telemetry::{Metrics, TelemetrySink};

/// Immutable after construction; shared through `Arc`.
pub(crate) struct ApiState {
    pub(crate) settings: Settings,
    pub(crate) telemetry: TelemetrySink,
    pub(crate) metrics: Metrics,
}

impl ApiState {
    pub(crate) const fn new(settings: Settings, telemetry: TelemetrySink, metrics: Metrics) -> Self {
        Self {
            settings,
            telemetry,
            metrics,
        }
    }
}
