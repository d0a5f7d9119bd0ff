//! Request ID for tracking a call through the gateway and its backends.
//!
//! An inbound `x-request-id` is reused verbatim; otherwise a fresh UUID v7
//! (time-ordered) is generated.

use axum::http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Header carrying the request ID in both directions
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest inbound ID accepted before a fresh one is generated
pub const MAX_REQUEST_ID_LEN: usize = 128;

/// Request ID echoed in the envelope, the response header and every
/// outbound call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new request ID (UUID v7)
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Read a usable ID from inbound headers.
    ///
    /// Empty, oversized or non-visible-ASCII values are ignored, as are
    /// values with surrounding whitespace.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?;
        if value.is_empty() || value.len() > MAX_REQUEST_ID_LEN || value.trim() != value {
            return None;
        }
        Some(Self(value.to_string()))
    }

    /// Reuse the inbound ID or generate one
    pub fn resolve(headers: &HeaderMap) -> Self {
        Self::from_headers(headers).unwrap_or_else(Self::generate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Header form. Every accepted or generated ID is visible ASCII.
    pub fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.0).ok()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
