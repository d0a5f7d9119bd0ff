//! Authentication middleware.
//!
//! Drives the [`AuthGate`] for the routed request and records how the
//! request got through. Refusals are answered here; the backend is never
//! contacted.

use crate::domain::context::{Passage, RequestContext};
use crate::domain::error::ApiError;
use crate::domain::request_id::RequestId;
use crate::envelope::EnvelopeNormalizer;
use crate::gate::AuthGate;
use axum::{body::Body, http::Request, response::Response};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, error, warn};

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    gate: Arc<AuthGate>,
    normalizer: EnvelopeNormalizer,
}

impl AuthLayer {
    pub fn new(gate: Arc<AuthGate>, normalizer: EnvelopeNormalizer) -> Self {
        Self { gate, normalizer }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            gate: Arc::clone(&self.gate),
            normalizer: self.normalizer,
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    gate: Arc<AuthGate>,
    normalizer: EnvelopeNormalizer,
}

impl<S> Service<Request<Body>> for AuthService<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let Some(mut ctx) = req.extensions_mut().remove::<RequestContext>() else {
            // Routing always runs first; reaching here is a wiring fault.
            error!(path = %req.uri().path(), "Auth layer reached without a routed context");
            let id = RequestId::resolve(req.headers());
            let response = self
                .normalizer
                .failure(&id, &ApiError::internal("request was not routed"));
            return Box::pin(async move { Ok(response) });
        };

        match self.gate.evaluate(&ctx, req.headers()) {
            Ok(passage) => {
                debug!(
                    request_id = %ctx.request_id,
                    service = %ctx.service_prefix,
                    passage = passage_kind(&passage),
                    "Request admitted"
                );
                ctx.passage = Some(passage);
                req.extensions_mut().insert(ctx);

                let mut inner = self.inner.clone();
                Box::pin(async move { inner.call(req).await })
            }
            Err(failure) => {
                warn!(
                    request_id = %ctx.request_id,
                    service = %ctx.service_prefix,
                    path = %ctx.original_path,
                    reason = %failure,
                    "Authentication failed"
                );
                let response = self
                    .normalizer
                    .failure(&ctx.request_id, &failure.to_api_error());
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

fn passage_kind(passage: &Passage) -> &'static str {
    match passage {
        Passage::Public => "public",
        Passage::Bypass => "bypass",
        Passage::Authenticated(_) => "token",
    }
}
