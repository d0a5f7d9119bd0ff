//! Gateway error types.
//!
//! [`ApiError`] is what a client eventually sees inside the failure
//! envelope; [`GatewayError`] covers startup and serve-loop failures.

use axum::http::{Method, StatusCode};
use serde_json::Value;
use std::fmt;

/// Error codes carried in `error.code`
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
    pub const SERVICE_NOT_CONFIGURED: &str = "SERVICE_NOT_CONFIGURED";
    pub const METHOD_NOT_ALLOWED: &str = "METHOD_NOT_ALLOWED";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
    pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const RESPONSE_VALIDATION_ERROR: &str = "RESPONSE_VALIDATION_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";

    /// Fallback code for an upstream failure without its own code
    pub fn http_status(status: u16) -> String {
        format!("HTTP_{}", status)
    }
}

/// Client-facing error, rendered into the failure envelope.
///
/// `details` and `stack` are always populated when known; the envelope
/// normalizer decides whether they are shown.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// HTTP status of the response
    pub status: StatusCode,
    /// Stable machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Optional additional detail
    pub details: Option<Value>,
    /// Optional diagnostic trace
    pub stack: Option<String>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
            stack: None,
        }
    }

    /// Attach details
    pub fn with_details(mut self, details: impl Into<Value>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attach a diagnostic trace
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED, message)
    }

    pub fn token_expired() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::TOKEN_EXPIRED,
            "Token has expired",
        )
    }

    pub fn service_not_configured(prefix: &str) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::SERVICE_NOT_CONFIGURED,
            format!("Service {} is not configured", prefix),
        )
    }

    pub fn method_not_allowed(method: &Method, service: &str, allowed: &[Method]) -> Self {
        let allowed = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            codes::METHOD_NOT_ALLOWED,
            format!("Method {} not allowed for {}", method, service),
        )
        .with_details(format!("Allowed methods: {}", allowed))
    }

    /// Backend unreachable or timed out
    pub fn service_unavailable(service: &str, cause: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::SERVICE_UNAVAILABLE,
            format!("{} is currently unavailable", service),
        )
        .with_details(cause.into())
    }

    pub fn payload_too_large(limit: usize) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            codes::PAYLOAD_TOO_LARGE,
            "Request body too large",
        )
        .with_details(format!("Maximum body size is {} bytes", limit))
    }

    /// Inbound body could not be read
    pub fn bad_request_body(reason: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::BAD_REQUEST,
            "Failed to read request body",
        )
        .with_details(reason.into())
    }

    pub fn response_validation(reason: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::RESPONSE_VALIDATION_ERROR,
            "Invalid response format",
        )
        .with_details(reason.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL_SERVER_ERROR,
            "An unexpected error occurred",
        )
        .with_details(detail.into())
    }

    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for request handling
pub type ApiResult<T> = Result<T, ApiError>;

/// Gateway startup and serve errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Invalid public path pattern
    #[error("whitelist error: {0}")]
    Whitelist(#[from] crate::whitelist::WhitelistError),

    /// Outbound HTTP client could not be built
    #[error("http client error: {0}")]
    Client(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Serve loop failed
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
