//! Service routing.
//!
//! Resolves the first path segment against the registry and enforces the
//! service's method set. Runs before authentication, so an unknown prefix
//! or a disallowed method is refused without looking at credentials.

use crate::domain::context::RequestContext;
use crate::domain::error::ApiError;
use crate::domain::request_id::RequestId;
use crate::envelope::EnvelopeNormalizer;
use crate::registry::ServiceRegistry;
use axum::{body::Body, http::Request, response::Response};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Routing layer
#[derive(Clone)]
pub struct ServiceRoutingLayer {
    registry: Arc<ServiceRegistry>,
    normalizer: EnvelopeNormalizer,
}

impl ServiceRoutingLayer {
    pub fn new(registry: Arc<ServiceRegistry>, normalizer: EnvelopeNormalizer) -> Self {
        Self {
            registry,
            normalizer,
        }
    }
}

impl<S> Layer<S> for ServiceRoutingLayer {
    type Service = ServiceRoutingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ServiceRoutingService {
            inner,
            registry: Arc::clone(&self.registry),
            normalizer: self.normalizer,
        }
    }
}

/// Routing service
#[derive(Clone)]
pub struct ServiceRoutingService<S> {
    inner: S,
    registry: Arc<ServiceRegistry>,
    normalizer: EnvelopeNormalizer,
}

impl<S> Service<Request<Body>> for ServiceRoutingService<S>
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
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(|| RequestId::resolve(req.headers()));
        let ctx = RequestContext::new(request_id, req.method().clone(), req.uri());

        let service = match self.registry.resolve(&ctx.service_prefix) {
            Ok(service) => service,
            Err(e) => {
                warn!(
                    request_id = %ctx.request_id,
                    prefix = %ctx.service_prefix,
                    error = %e,
                    "Request for unconfigured service"
                );
                let response = self.normalizer.failure(
                    &ctx.request_id,
                    &ApiError::service_not_configured(&ctx.service_prefix),
                );
                return Box::pin(async move { Ok(response) });
            }
        };

        if !ServiceRegistry::is_method_allowed(&service, &ctx.method) {
            warn!(
                request_id = %ctx.request_id,
                service = %service.name,
                method = %ctx.method,
                "Method not allowed for service"
            );
            let err =
                ApiError::method_not_allowed(&ctx.method, &service.name, &service.allowed_methods);
            let response = self.normalizer.failure(&ctx.request_id, &err);
            return Box::pin(async move { Ok(response) });
        }

        debug!(
            request_id = %ctx.request_id,
            service = %service.name,
            path = %ctx.service_path,
            "Routed request"
        );
        req.extensions_mut().insert(ctx.with_service(service));

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}
