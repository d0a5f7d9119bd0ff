//! Middleware stack for the gateway.
//!
//! Outer stack (every route): Request → RequestId → Tracing → Cors → FaultBarrier → Router
//!
//! Proxy stack (fallback route): ServiceRouting → Auth → Forward
//!
//! Routing runs before authentication so an unknown prefix or a disallowed
//! method is answered without looking at credentials.

pub mod auth;
pub mod cors;
pub mod fault;
pub mod request_id;
pub mod routing;
pub mod tracing;

pub use auth::AuthLayer;
pub use cors::create_cors_layer;
pub use fault::FaultBarrierLayer;
pub use request_id::RequestIdLayer;
pub use routing::ServiceRoutingLayer;
pub use tracing::TracingLayer;

use crate::envelope::EnvelopeNormalizer;
use crate::gate::AuthGate;
use crate::registry::ServiceRegistry;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Middleware stack builder
#[derive(Clone)]
pub struct MiddlewareStack {
    pub request_id: RequestIdLayer,
    pub tracing: TracingLayer,
    pub cors: Option<CorsLayer>,
    pub fault: FaultBarrierLayer,
    pub routing: ServiceRoutingLayer,
    pub auth: AuthLayer,
}

impl MiddlewareStack {
    /// Create the middleware stack from the gateway's shared components
    pub fn new(
        config: &crate::domain::config::GatewayConfig,
        registry: Arc<ServiceRegistry>,
        gate: Arc<AuthGate>,
        normalizer: EnvelopeNormalizer,
    ) -> Self {
        Self {
            request_id: RequestIdLayer::new(),
            tracing: TracingLayer::new(),
            cors: create_cors_layer(&config.cors),
            fault: FaultBarrierLayer::new(normalizer),
            routing: ServiceRoutingLayer::new(registry, normalizer),
            auth: AuthLayer::new(gate, normalizer),
        }
    }
}
