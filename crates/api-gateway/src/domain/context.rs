//! Per-request context threaded through the middleware chain.

use super::claims::Claims;
use super::request_id::RequestId;
use crate::registry::ServiceDescriptor;
use axum::http::{Method, Uri};
use std::sync::Arc;

/// How a request got past the auth gate
#[derive(Debug, Clone, PartialEq)]
pub enum Passage {
    /// Path is public for the target service
    Public,
    /// Bypass header was present
    Bypass,
    /// Bearer token verified and claims validated
    Authenticated(Arc<Claims>),
}

/// Everything the gateway has learned about one request.
///
/// Built by the routing layer, completed by the auth layer and consumed by
/// the forwarder. Never shared between requests.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub method: Method,
    /// Full inbound path, prefix segment included
    pub original_path: String,
    /// Raw query string, forwarded verbatim
    pub query: Option<String>,
    /// First path segment
    pub service_prefix: String,
    /// Path below the prefix segment, used for public-path matching
    pub service_path: String,
    /// Set once the prefix resolves
    pub service: Option<Arc<ServiceDescriptor>>,
    /// Set once the auth gate passes
    pub passage: Option<Passage>,
}

impl RequestContext {
    pub fn new(request_id: RequestId, method: Method, uri: &Uri) -> Self {
        let (prefix, rest) = split_prefix(uri.path());
        Self {
            request_id,
            method,
            original_path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            service_prefix: prefix.to_string(),
            service_path: rest.to_string(),
            service: None,
            passage: None,
        }
    }

    /// Attach the resolved descriptor
    pub fn with_service(mut self, service: Arc<ServiceDescriptor>) -> Self {
        self.service = Some(service);
        self
    }

    /// Verified claims, when the request was authenticated by token
    pub fn claims(&self) -> Option<&Claims> {
        match &self.passage {
            Some(Passage::Authenticated(claims)) => Some(claims),
            _ => None,
        }
    }

    /// Path plus query, as sent upstream
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.original_path, query),
            None => self.original_path.clone(),
        }
    }
}

/// Split `/emp/api/x` into `("emp", "/api/x")`.
pub fn split_prefix(path: &str) -> (&str, &str) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    match trimmed.find('/') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
        None => (trimmed, "/"),
    }
}
