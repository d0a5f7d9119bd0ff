//! Domain types for the gateway.
//!
//! Configuration, errors, claims and the per-request context. Nothing here
//! performs I/O.

pub mod claims;
pub mod config;
pub mod context;
pub mod error;
pub mod request_id;

// Re-exports for convenience
pub use claims::{Claims, ClaimsError};
pub use config::{ConfigError, GatewayConfig, ServiceConfig};
pub use context::{Passage, RequestContext};
pub use error::{ApiError, ApiResult, GatewayError};
pub use request_id::{RequestId, REQUEST_ID_HEADER};
