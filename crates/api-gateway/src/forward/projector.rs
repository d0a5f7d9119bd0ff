//! Outbound header projection.
//!
//! The outbound header set is built from an allow-list, so nothing the
//! client sent under a claim header name can reach a backend.

use super::ForwardStrategy;
use crate::domain::claims::Claims;
use crate::domain::context::RequestContext;
use crate::domain::request_id::REQUEST_ID_HEADER;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

type ClaimAccessor = fn(&Claims) -> Option<String>;

/// Claim → header table
pub const CLAIM_HEADERS: &[(&str, ClaimAccessor)] = &[
    ("x-user-id", |c: &Claims| Some(c.id.clone())),
    ("x-user-email", |c: &Claims| Some(c.email.clone())),
    ("x-user-roles", |c: &Claims| Some(c.roles.join(","))),
    ("x-organization-id", |c: &Claims| c.organization_id.clone()),
    ("x-employee-id", |c: &Claims| c.employee_id.clone()),
    ("x-user-first-name", |c: &Claims| c.first_name.clone()),
    ("x-user-last-name", |c: &Claims| c.last_name.clone()),
    ("x-user-department", |c: &Claims| c.department.clone()),
    ("x-user-position", |c: &Claims| c.position.clone()),
    ("x-user-permissions", |c: &Claims| c.permissions.as_ref().map(|p| p.join(","))),
    ("x-tenant-id", |c: &Claims| c.tenant_id.clone()),
    ("x-user-locale", |c: &Claims| c.locale.clone()),
    ("x-user-timezone", |c: &Claims| c.timezone.clone()),
    ("x-user-last-login", |c: &Claims| c.last_login.clone()),
    ("x-user-is-active", |c: &Claims| c.is_active.map(|a| a.to_string())),
    ("x-user-metadata", |c: &Claims| {
        c.metadata
            .as_ref()
            .and_then(|m| serde_json::to_string(m).ok())
    }),
];

const API_KEY_HEADER: &str = "x-api-key";

/// Builds the header set sent to a backend
#[derive(Debug, Clone)]
pub struct HeaderProjector {
    identity_prefix: String,
    bypass_header: HeaderName,
}

impl HeaderProjector {
    pub fn new(identity_prefix: impl Into<String>, bypass_header: HeaderName) -> Self {
        Self {
            identity_prefix: identity_prefix.into(),
            bypass_header,
        }
    }

    /// Does `prefix` name the identity backend?
    pub fn is_identity(&self, prefix: &str) -> bool {
        prefix == self.identity_prefix
    }

    pub fn project(
        &self,
        ctx: &RequestContext,
        inbound: &HeaderMap,
        strategy: ForwardStrategy,
    ) -> HeaderMap {
        let mut out = HeaderMap::new();

        if let Some(value) = ctx.request_id.header_value() {
            out.insert(REQUEST_ID_HEADER, value);
        }

        match (inbound.get(header::CONTENT_TYPE), strategy) {
            (Some(value), _) => {
                out.insert(header::CONTENT_TYPE, value.clone());
            }
            (None, ForwardStrategy::Buffered) => {
                out.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            (None, ForwardStrategy::Streaming) => {}
        }

        if strategy == ForwardStrategy::Streaming {
            if let Some(length) = inbound.get(header::CONTENT_LENGTH) {
                out.insert(header::CONTENT_LENGTH, length.clone());
            }
        }

        copy(inbound, &mut out, &HeaderName::from_static(API_KEY_HEADER));
        copy(inbound, &mut out, &self.bypass_header);

        if self.is_identity(&ctx.service_prefix) {
            copy(inbound, &mut out, &header::AUTHORIZATION);
        } else if let Some(claims) = ctx.claims() {
            project_claims(claims, &mut out);
        }

        out
    }
}

fn copy(inbound: &HeaderMap, out: &mut HeaderMap, name: &HeaderName) {
    if let Some(value) = inbound.get(name) {
        out.insert(name.clone(), value.clone());
    }
}

fn project_claims(claims: &Claims, out: &mut HeaderMap) {
    for &(name, accessor) in CLAIM_HEADERS {
        let Some(value) = accessor(claims) else {
            continue;
        };
        match HeaderValue::from_bytes(value.as_bytes()) {
            Ok(value) => {
                out.insert(HeaderName::from_static(name), value);
            }
            Err(_) => debug!(header = name, "Claim value not representable as a header"),
        }
    }
}
