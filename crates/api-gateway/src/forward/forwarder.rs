//! Upstream dispatch and response translation.
//!
//! The outbound call lives inside the inbound request's future. If the
//! client disconnects, axum drops that future, which drops the reqwest call
//! and aborts the body pump; [`InFlight`] logs the cancellation.

use super::{ForwardStrategy, HeaderProjector};
use crate::domain::config::GatewayConfig;
use crate::domain::context::RequestContext;
use crate::domain::error::{codes, ApiError, GatewayError};
use crate::domain::request_id::RequestId;
use crate::registry::ServiceDescriptor;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, Method, Request, StatusCode},
};
use bytes::Bytes;
use futures::StreamExt;
use http_body_util::LengthLimitError;
use serde_json::Value;
use std::error::Error as StdError;
use std::io;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Chunks buffered between the inbound body and the outbound stream
const PUMP_CAPACITY: usize = 8;

/// Translated upstream outcome
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub data: Value,
}

/// Executes outbound calls against resolved services
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    projector: HeaderProjector,
    max_body_size: usize,
}

impl Forwarder {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeouts.upstream)
            .connect_timeout(config.timeouts.connect)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        let bypass_header = HeaderName::from_bytes(config.auth.bypass_header.as_bytes())
            .map_err(|_| {
                crate::domain::config::ConfigError::InvalidHeader(config.auth.bypass_header.clone())
            })?;

        Ok(Self {
            client,
            projector: HeaderProjector::new(config.auth.identity_prefix.clone(), bypass_header),
            max_body_size: config.limits.max_body_size,
        })
    }

    pub fn projector(&self) -> &HeaderProjector {
        &self.projector
    }

    /// Forward `request` to the service resolved in `ctx`.
    pub async fn forward(
        &self,
        ctx: &RequestContext,
        request: Request<Body>,
    ) -> Result<UpstreamReply, ApiError> {
        let service = ctx
            .service
            .as_ref()
            .ok_or_else(|| ApiError::internal("request reached the forwarder unresolved"))?;

        let mut in_flight = InFlight::new(&ctx.request_id, &service.name);
        let result = self.dispatch(ctx, service, request, &mut in_flight).await;
        in_flight.complete();
        result
    }

    async fn dispatch(
        &self,
        ctx: &RequestContext,
        service: &ServiceDescriptor,
        request: Request<Body>,
        in_flight: &mut InFlight<'_>,
    ) -> Result<UpstreamReply, ApiError> {
        let strategy = ForwardStrategy::select(request.headers());
        let (parts, body) = request.into_parts();
        let headers = self.projector.project(ctx, &parts.headers, strategy);
        let url = format!("{}{}", service.base_url, ctx.path_and_query());

        let mut outbound = self
            .client
            .request(ctx.method.clone(), &url)
            .headers(headers);

        match strategy {
            ForwardStrategy::Buffered => {
                if sends_body(&ctx.method) {
                    let bytes = read_body(&parts.headers, body, self.max_body_size).await?;
                    if !bytes.is_empty() {
                        outbound = outbound.body(bytes);
                    }
                }
            }
            ForwardStrategy::Streaming => {
                let (stream, pump) = pump_body(body);
                in_flight.attach(pump);
                outbound = outbound.body(reqwest::Body::wrap_stream(stream));
            }
        }

        debug!(
            request_id = %ctx.request_id,
            service = %service.name,
            url = %url,
            strategy = ?strategy,
            "Forwarding request"
        );

        let response = outbound
            .send()
            .await
            .map_err(|e| service_unreachable(&ctx.request_id, service, &e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| service_unreachable(&ctx.request_id, service, &e))?;

        info!(
            request_id = %ctx.request_id,
            service = %service.name,
            status = status.as_u16(),
            latency_ms = in_flight.elapsed_ms(),
            "Upstream responded"
        );

        translate(status, &body)
    }
}

/// GET and HEAD never carry a body upstream
fn sends_body(method: &Method) -> bool {
    method != Method::GET && method != Method::HEAD
}

/// Read the whole inbound body, bounded by `limit`.
async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, ApiError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(ApiError::payload_too_large(limit));
    }

    axum::body::to_bytes(body, limit).await.map_err(|e| {
        if is_length_limit(&e) {
            ApiError::payload_too_large(limit)
        } else {
            ApiError::bad_request_body(e.to_string())
        }
    })
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = err.source();
    }
    false
}

/// Pipe the inbound body through a channel.
///
/// axum's body is not `Sync`, reqwest's streaming body requires it.
fn pump_body(body: Body) -> (ReceiverStream<Result<Bytes, io::Error>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(PUMP_CAPACITY);
    let pump = tokio::spawn(async move {
        let mut chunks = body.into_data_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(io::Error::other);
            let failed = chunk.is_err();
            if tx.send(chunk).await.is_err() || failed {
                break;
            }
        }
    });
    (ReceiverStream::new(rx), pump)
}

fn service_unreachable(
    request_id: &RequestId,
    service: &ServiceDescriptor,
    err: &reqwest::Error,
) -> ApiError {
    let cause = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    };

    warn!(
        request_id = %request_id,
        service = %service.name,
        error = %err,
        "Upstream call failed"
    );

    ApiError::service_unavailable(&service.name, cause).with_stack(format!("{:?}", err))
}

/// Map an upstream status and body to a reply or an error.
pub(crate) fn translate(status: StatusCode, body: &[u8]) -> Result<UpstreamReply, ApiError> {
    let body = parse_body(body);

    if status.is_success() {
        let data = body
            .get("data")
            .filter(|d| !d.is_null())
            .cloned()
            .unwrap_or(body);
        return Ok(UpstreamReply { status, data });
    }

    let nested = body.get("error").filter(|e| e.is_object());
    let field = |name: &str| {
        nested
            .and_then(|e| e.get(name))
            .filter(|v| !v.is_null())
            .or_else(|| body.get(name).filter(|v| !v.is_null()))
    };

    let code = field("code")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| codes::http_status(status.as_u16()));
    let message = field("message")
        .and_then(Value::as_str)
        .unwrap_or("Service request failed")
        .to_string();
    let details = field("details").cloned().unwrap_or_else(|| {
        Value::String(format!(
            "Request failed with status code {}",
            status.as_u16()
        ))
    });
    let stack = field("stack").and_then(Value::as_str).map(str::to_string);

    let mut err = ApiError::new(status, code, message).with_details(details);
    err.stack = stack;
    Err(err)
}

/// JSON when possible, otherwise the body as a string
fn parse_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// Tracks one outbound call; logs when dropped before completion.
struct InFlight<'a> {
    request_id: &'a RequestId,
    service: &'a str,
    started: Instant,
    pump: Option<JoinHandle<()>>,
    done: bool,
}

impl<'a> InFlight<'a> {
    fn new(request_id: &'a RequestId, service: &'a str) -> Self {
        Self {
            request_id,
            service,
            started: Instant::now(),
            pump: None,
            done: false,
        }
    }

    fn attach(&mut self, pump: JoinHandle<()>) {
        self.pump = Some(pump);
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn complete(&mut self) {
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if !self.done {
            warn!(
                request_id = %self.request_id,
                service = self.service,
                elapsed_ms = self.elapsed_ms(),
                "Client disconnected, upstream call cancelled"
            );
        }
    }
}
