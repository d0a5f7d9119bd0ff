//! Outbound forwarding: header projection and the upstream call.

pub mod forwarder;
pub mod projector;

pub use forwarder::{Forwarder, UpstreamReply};
pub use projector::{HeaderProjector, CLAIM_HEADERS};

use axum::http::{header, HeaderMap};

/// How the inbound body travels upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardStrategy {
    /// Read fully (bounded), then sent as-is
    Buffered,
    /// Piped chunk by chunk, never parsed
    Streaming,
}

impl ForwardStrategy {
    /// Multipart uploads stream; everything else is buffered.
    pub fn select(headers: &HeaderMap) -> Self {
        let is_multipart = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| {
                ct.trim_start()
                    .to_ascii_lowercase()
                    .starts_with("multipart/form-data")
            })
            .unwrap_or(false);

        if is_multipart {
            Self::Streaming
        } else {
            Self::Buffered
        }
    }
}
