//! Shared HTTP constants (headers, problem URIs, telemetry names).

use std::time::Duration;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

pub(crate) const PROBLEM_INTERNAL: &str = "https://lumen.dev/problems/internal";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://lumen.dev/problems/not-found";

/// Route label used for requests no route matched.
pub(crate) const UNMATCHED_ROUTE_LABEL: &str = "unmatched";

pub(crate) const EVENT_HELLO_CALLED: &str = "hello_endpoint_called";
pub(crate) const EVENT_CONFIG_ACCESSED: &str = "config_endpoint_accessed";
pub(crate) const METRIC_HELLO_RESPONSE_TIME: &str = "hello_response_time";
pub(crate) const METRIC_CONFIG_RESPONSE_TIME: &str = "config_response_time";

/// Simulated work performed by the hello endpoint.
pub(crate) const HELLO_WORK: Duration = Duration::from_millis(10);
