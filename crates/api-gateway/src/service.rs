//! Gateway service: wires the components into one axum router and serves it.

use crate::domain::config::GatewayConfig;
use crate::domain::context::RequestContext;
use crate::domain::error::{ApiError, GatewayError};
use crate::domain::request_id::RequestId;
use crate::envelope::EnvelopeNormalizer;
use crate::forward::Forwarder;
use crate::gate::AuthGate;
use crate::middleware::MiddlewareStack;
use crate::registry::ServiceRegistry;
use crate::whitelist::WhitelistMatcher;
use axum::{
    body::Body,
    extract::{Extension, State},
    http::{header, HeaderValue, Method, Request, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::{error, info};

/// API gateway service
pub struct GatewayService {
    config: GatewayConfig,
    registry: Arc<ServiceRegistry>,
    whitelist: Arc<WhitelistMatcher>,
    gate: Arc<AuthGate>,
    forwarder: Arc<Forwarder>,
    normalizer: EnvelopeNormalizer,
}

impl GatewayService {
    /// Validate the configuration and build every component.
    ///
    /// Invalid service entries are skipped with a warning; an invalid
    /// secret, header, timeout or public-path pattern is fatal.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;

        let registry = Arc::new(ServiceRegistry::load(&config.services));
        if registry.is_empty() {
            error!("No valid services configured; every proxied request will be refused");
        }

        let whitelist = Arc::new(WhitelistMatcher::from_config(
            &config.whitelist,
            &config.auth.identity_prefix,
        )?);
        let gate = Arc::new(AuthGate::new(&config.auth, Arc::clone(&whitelist))?);
        let forwarder = Arc::new(Forwarder::new(&config)?);
        let normalizer = EnvelopeNormalizer::new(config.errors);

        info!(
            services = registry.len(),
            identity = %config.auth.identity_prefix,
            upstream_timeout_ms = config.timeouts.upstream.as_millis() as u64,
            "Gateway initialised"
        );

        Ok(Self {
            config,
            registry,
            whitelist,
            gate,
            forwarder,
            normalizer,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<ServiceRegistry> {
        Arc::clone(&self.registry)
    }

    /// Live public-path matcher; `add`/`remove` take effect immediately
    pub fn whitelist(&self) -> Arc<WhitelistMatcher> {
        Arc::clone(&self.whitelist)
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        let stack = MiddlewareStack::new(
            &self.config,
            Arc::clone(&self.registry),
            Arc::clone(&self.gate),
            self.normalizer,
        );

        let forwarder = Arc::clone(&self.forwarder);
        let normalizer = self.normalizer;
        let proxy = ServiceBuilder::new()
            .layer(stack.routing)
            .layer(stack.auth)
            .service_fn(move |req: Request<Body>| {
                let forwarder = Arc::clone(&forwarder);
                async move { Ok::<_, Infallible>(proxy_request(&forwarder, normalizer, req).await) }
            });

        let middleware = ServiceBuilder::new()
            .layer(stack.request_id)
            .layer(stack.tracing)
            .option_layer(stack.cors)
            .layer(stack.fault);

        let state = AppState {
            registry: Arc::clone(&self.registry),
            normalizer: self.normalizer,
        };

        Router::new()
            .route("/health", get(health_check).fallback(health_method_refused))
            .fallback_service(proxy)
            .layer(middleware)
            .with_state(state)
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(addr = %addr, services = self.registry.len(), "Gateway listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Gateway stopped");
        Ok(())
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn start<F>(self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{}: {}", addr, e)))?;
        self.serve(listener, shutdown).await
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    registry: Arc<ServiceRegistry>,
    normalizer: EnvelopeNormalizer,
}

async fn health_check(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
) -> Response {
    let request_id = request_id
        .map(|Extension(id)| id)
        .unwrap_or_else(RequestId::generate);
    let services: Vec<_> = state
        .registry
        .services()
        .map(|s| json!({ "name": s.name, "status": "configured" }))
        .collect();

    state.normalizer.success(
        &request_id,
        StatusCode::OK,
        json!({ "status": "ok", "services": services }),
    )
}

/// Any method other than GET (or HEAD) on `/health`
async fn health_method_refused(
    State(state): State<AppState>,
    method: Method,
    request_id: Option<Extension<RequestId>>,
) -> Response {
    let request_id = request_id
        .map(|Extension(id)| id)
        .unwrap_or_else(RequestId::generate);
    let err = ApiError::method_not_allowed(&method, "health", &[Method::GET]);
    let mut response = state.normalizer.failure(&request_id, &err);
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("GET,HEAD"));
    response
}

/// Terminal step of the proxy stack
async fn proxy_request(
    forwarder: &Forwarder,
    normalizer: EnvelopeNormalizer,
    mut req: Request<Body>,
) -> Response {
    let Some(ctx) = req.extensions_mut().remove::<RequestContext>() else {
        error!(path = %req.uri().path(), "Forward reached without a routed context");
        let id = RequestId::resolve(req.headers());
        return normalizer.failure(&id, &ApiError::internal("request was not routed"));
    };

    match forwarder.forward(&ctx, req).await {
        Ok(reply) => normalizer.success(&ctx.request_id, reply.status, reply.data),
        Err(err) => normalizer.failure(&ctx.request_id, &err),
    }
}
