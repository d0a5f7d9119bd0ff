//! Request tracing.
//!
//! Opens one `api_request` span per request, records the outcome on it and
//! logs a completion line with status and latency.

use crate::domain::request_id::RequestId;
use axum::{body::Body, http::Request, response::Response};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{field, info, info_span, warn, Instrument, Span};

/// Tracing layer that creates spans for each request
#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

/// Tracing service
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();

        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map(ToString::to_string)
            .unwrap_or_default();
        let parent = req
            .headers()
            .get("traceparent")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_traceparent);

        let span = info_span!(
            "api_request",
            http.method = %method,
            http.target = %path,
            request_id = %request_id,
            trace.parent_id = field::Empty,
            http.status_code = field::Empty,
            otel.kind = "server",
            otel.status_code = field::Empty,
        );
        if let Some((trace_id, parent_id)) = parent {
            span.record(
                "trace.parent_id",
                field::display(format!("{}-{}", trace_id, parent_id)),
            );
        }

        Box::pin(
            async move {
                let started = Instant::now();
                let result = inner.call(req).await;
                let latency_ms = started.elapsed().as_millis() as u64;

                match &result {
                    Ok(response) => {
                        let status = response.status();
                        let span = Span::current();
                        span.record("http.status_code", status.as_u16());
                        span.record(
                            "otel.status_code",
                            if status.is_server_error() { "ERROR" } else { "OK" },
                        );
                        if status.is_server_error() {
                            warn!(status = status.as_u16(), latency_ms, "Request failed");
                        } else {
                            info!(status = status.as_u16(), latency_ms, "Request completed");
                        }
                    }
                    Err(_) => {
                        Span::current().record("otel.status_code", "ERROR");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

/// W3C `traceparent`: `version-trace_id-parent_id-flags`
fn parse_traceparent(value: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = value.trim().split('-').collect();
    match parts.as_slice() {
        [_, trace_id, parent_id, _]
            if trace_id.len() == 32
                && parent_id.len() == 16
                && trace_id.chars().all(|c| c.is_ascii_hexdigit())
                && parent_id.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            Some((trace_id.to_string(), parent_id.to_string()))
        }
        _ => None,
    }
}
