//! Request telemetry middleware: one request record per inbound call.
//!
//! # Design
//! - Installed with `Router::layer` so matched routes and the fallback are both covered.
//! - The downstream future runs with the request id as its operation id, so handler
//!   emissions correlate with the request record.
//! - Enqueueing never fails the request; a disabled sink costs one branch.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

use axum::extract::MatchedPath;
use axum::http::{Request, header::USER_AGENT};
use lumen_telemetry::{RequestRecord, TelemetryRecord, record_request_span, with_operation_id};
use tower::{Layer, Service};
use tracing::Span;
use uuid::Uuid;

use crate::http::constants::{HEADER_REQUEST_ID, UNMATCHED_ROUTE_LABEL};
use crate::state::ApiState;

/// Wraps HTTP services to emit request telemetry and per-route counters.
#[derive(Clone)]
pub(crate) struct RequestTelemetryLayer {
    state: Arc<ApiState>,
}

impl RequestTelemetryLayer {
    pub(crate) const fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for RequestTelemetryLayer {
    type Service = RequestTelemetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTelemetryService {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

#[derive(Clone)]
pub(crate) struct RequestTelemetryService<S> {
    inner: S,
    state: Arc<ApiState>,
}

/// Request fields captured before the request is handed downstream.
struct RequestFacts {
    id: String,
    method: String,
    url: String,
    route: String,
    user_agent: String,
}

impl RequestFacts {
    fn capture<B>(req: &Request<B>) -> Self {
        let id = req
            .headers()
            .get(HEADER_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
        let route = req
            .extensions()
            .get::<MatchedPath>()
            .map(|matched| matched.as_str().to_string())
            .unwrap_or_default();
        let url = req
            .uri()
            .path_and_query()
            .map_or_else(|| req.uri().path(), |pq| pq.as_str())
            .to_string();
        let user_agent = req
            .headers()
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Self {
            id,
            method: req.method().to_string(),
            url,
            route,
            user_agent,
        }
    }

    fn route_label(&self) -> &str {
        if self.route.is_empty() {
            UNMATCHED_ROUTE_LABEL
        } else {
            &self.route
        }
    }
}

impl<S, B> Service<Request<B>> for RequestTelemetryService<S>
where
    S: Service<Request<B>, Response = axum::response::Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let started = Instant::now();
        let facts = RequestFacts::capture(&req);
        record_request_span(&Span::current(), &facts.id, facts.route_label());
        let state = Arc::clone(&self.state);
        let fut = self.inner.call(req);

        Box::pin(async move {
            let operation_id = facts.id.clone();
            with_operation_id(operation_id, async move {
                let response = fut.await?;
                let duration = started.elapsed();
                let status = response.status().as_u16();

                state.metrics.inc_http_request(facts.route_label(), status);

                if state.telemetry.is_enabled() {
                    let record = RequestRecord::new(facts.method, facts.url, duration, status)
                        .with_id(facts.id)
                        .with_property("route", facts.route)
                        .with_property("user_agent", facts.user_agent)
                        .with_property("app_version", state.settings.app.version.clone());
                    state.telemetry.track(TelemetryRecord::Request(record));
                }
                Ok(response)
            })
            .await
        })
    }
}
