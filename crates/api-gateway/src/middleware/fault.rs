//! Fault barrier.
//!
//! Converts a panic anywhere below this layer into an enveloped 500 so the
//! connection is answered and the process keeps serving.

use crate::domain::error::ApiError;
use crate::domain::request_id::RequestId;
use crate::envelope::EnvelopeNormalizer;
use axum::{body::Body, http::Request, response::Response};
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::error;

/// Fault barrier layer
#[derive(Clone)]
pub struct FaultBarrierLayer {
    normalizer: EnvelopeNormalizer,
}

impl FaultBarrierLayer {
    pub fn new(normalizer: EnvelopeNormalizer) -> Self {
        Self { normalizer }
    }
}

impl<S> Layer<S> for FaultBarrierLayer {
    type Service = FaultBarrierService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FaultBarrierService {
            inner,
            normalizer: self.normalizer,
        }
    }
}

/// Fault barrier service
#[derive(Clone)]
pub struct FaultBarrierService<S> {
    inner: S,
    normalizer: EnvelopeNormalizer,
}

impl<S> Service<Request<Body>> for FaultBarrierService<S>
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
        let normalizer = self.normalizer;
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(RequestId::generate);
        let path = req.uri().path().to_string();

        Box::pin(async move {
            // `call` runs inside the guarded future so a panic while
            // constructing the inner future is caught as well.
            let guarded = AssertUnwindSafe(async move { inner.call(req).await }).catch_unwind();

            match guarded.await {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(
                        request_id = %request_id,
                        path = %path,
                        panic = %message,
                        "Unhandled fault while serving request"
                    );

                    let mut err = ApiError::internal(message);
                    if normalizer.visibility().show_stack {
                        err = err.with_stack(Backtrace::force_capture().to_string());
                    }
                    Ok(normalizer.failure(&request_id, &err))
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
