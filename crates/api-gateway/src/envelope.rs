//! Response envelope shared by every gateway response.
//!
//! ```json
//! { "success": true,  "timestamp": "...", "requestId": "...", "data": ... }
//! { "success": false, "timestamp": "...", "requestId": "...",
//!   "error": { "code": "...", "message": "...", "details": ..., "stack": "..." } }
//! ```

use crate::domain::config::ErrorsConfig;
use crate::domain::error::ApiError;
use crate::domain::request_id::{RequestId, REQUEST_ID_HEADER};
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

/// Standard response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub success: bool,
    /// ISO-8601 UTC, millisecond precision
    pub timestamp: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// `error` member of a failure envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ResponseEnvelope {
    pub fn success(request_id: &RequestId, data: Value) -> Self {
        Self {
            success: true,
            timestamp: now_timestamp(),
            request_id: request_id.to_string(),
            data: Some(data),
            error: None,
        }
    }

    /// Failure envelope with `details`/`stack` gated by `visibility`
    pub fn failure(request_id: &RequestId, err: &ApiError, visibility: ErrorsConfig) -> Self {
        Self {
            success: false,
            timestamp: now_timestamp(),
            request_id: request_id.to_string(),
            data: None,
            error: Some(ErrorBody {
                code: err.code.clone(),
                message: err.message.clone(),
                details: err.details.clone().filter(|_| visibility.show_details),
                stack: err.stack.clone().filter(|_| visibility.show_stack),
            }),
        }
    }

    /// Structural self-check run before every emission
    pub fn check(&self) -> Result<(), String> {
        if self.request_id.trim().is_empty() {
            return Err("requestId is empty".into());
        }
        if self.timestamp.is_empty() {
            return Err("timestamp is empty".into());
        }
        match (self.success, &self.data, &self.error) {
            (true, Some(_), None) => Ok(()),
            (false, None, Some(err)) if !err.code.is_empty() && !err.message.is_empty() => Ok(()),
            (false, None, Some(_)) => Err("error code or message is empty".into()),
            (true, _, _) => Err("success envelope must carry data and no error".into()),
            (false, _, _) => Err("failure envelope must carry an error and no data".into()),
        }
    }
}

/// Current time as `2024-01-01T00:00:00.000Z`
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Turns outcomes into enveloped HTTP responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeNormalizer {
    visibility: ErrorsConfig,
}

impl EnvelopeNormalizer {
    pub fn new(visibility: ErrorsConfig) -> Self {
        Self { visibility }
    }

    pub fn visibility(&self) -> ErrorsConfig {
        self.visibility
    }

    pub fn success(&self, request_id: &RequestId, status: StatusCode, data: Value) -> Response {
        self.render(request_id, status, ResponseEnvelope::success(request_id, data))
    }

    pub fn failure(&self, request_id: &RequestId, err: &ApiError) -> Response {
        self.render(
            request_id,
            err.status,
            ResponseEnvelope::failure(request_id, err, self.visibility),
        )
    }

    /// Self-check, serialize and attach the standard headers.
    fn render(
        &self,
        request_id: &RequestId,
        status: StatusCode,
        envelope: ResponseEnvelope,
    ) -> Response {
        let (status, envelope) = match envelope.check() {
            Ok(()) => (status, envelope),
            Err(reason) => {
                error!(request_id = %request_id, reason = %reason, "Response failed envelope validation");
                let id = if request_id.as_str().trim().is_empty() {
                    RequestId::generate()
                } else {
                    request_id.clone()
                };
                let err = ApiError::response_validation(reason);
                (
                    err.status,
                    ResponseEnvelope::failure(&id, &err, self.visibility),
                )
            }
        };

        let body = match serde_json::to_vec(&envelope) {
            Ok(body) => body,
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Failed to serialize envelope");
                return fallback_response(request_id);
            }
        };

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Ok(value) = HeaderValue::from_str(&envelope.request_id) {
            headers.insert(REQUEST_ID_HEADER, value);
        }
        if status == StatusCode::UNAUTHORIZED {
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Last resort when the envelope itself cannot be serialized
fn fallback_response(request_id: &RequestId) -> Response {
    let body = serde_json::json!({
        "success": false,
        "timestamp": now_timestamp(),
        "requestId": request_id.as_str(),
        "error": {
            "code": crate::domain::error::codes::INTERNAL_SERVER_ERROR,
            "message": "An unexpected error occurred",
        }
    });
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}
