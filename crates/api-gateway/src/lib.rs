//! Service gateway: single HTTP entry point in front of the backend services.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            API GATEWAY                               │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  RequestId → Tracing → Cors → FaultBarrier                           │
//! │        │                                                             │
//! │        ├── GET /health ──────────────────────────→ Envelope          │
//! │        │                                                             │
//! │        └── /{prefix}/...                                             │
//! │               │                                                      │
//! │  ┌────────────┴─────────────┐    ┌──────────────────────┐            │
//! │  │ ServiceRouting           │───→│ ServiceRegistry      │            │
//! │  │ (503 unknown, 405 method)│    └──────────────────────┘            │
//! │  └────────────┬─────────────┘                                        │
//! │  ┌────────────┴─────────────┐    ┌──────────────────────┐            │
//! │  │ Auth (AuthGate)          │───→│ WhitelistMatcher     │            │
//! │  │ public / bypass / token  │    │ (arc-swap snapshot)  │            │
//! │  └────────────┬─────────────┘    └──────────────────────┘            │
//! │  ┌────────────┴─────────────┐                                        │
//! │  │ Forwarder                │  HeaderProjector builds the outbound   │
//! │  │ buffered | streaming     │  header set from an allow-list         │
//! │  └────────────┬─────────────┘                                        │
//! │               └──────────────────────────────────→ Envelope          │
//! └───────────────────────────────┬──────────────────────────────────────┘
//!                                 │
//!        ┌──────────┬─────────────┼────────────┬──────────┐
//!        ▼          ▼             ▼            ▼          ▼
//!       id         emp           rec          eng   perf / nt
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use api_gateway::{GatewayConfig, GatewayService};
//!
//! let mut config = GatewayConfig::default();
//! config.auth.jwt_secret = std::env::var("JWT_SECRET")?;
//! let service = GatewayService::new(config)?;
//! service.start(shutdown_signal()).await?;
//! ```
//!
//! # Security
//!
//! - Routing and method checks happen before any credential is read
//! - HS256 bearer tokens with mandatory `exp` and zero leeway
//! - Claim headers are rebuilt from the verified token; client copies are dropped
//! - Raw `Authorization` only ever reaches the identity service
//! - Buffered bodies are size-limited before forwarding

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod envelope;
pub mod forward;
pub mod gate;
pub mod middleware;
pub mod registry;
pub mod service;
pub mod whitelist;

// Re-exports for public API
pub use domain::config::{GatewayConfig, ServiceConfig};
pub use domain::error::{ApiError, ApiResult, GatewayError};
pub use domain::{Claims, Passage, RequestContext, RequestId, REQUEST_ID_HEADER};
pub use envelope::{EnvelopeNormalizer, ResponseEnvelope};
pub use forward::{ForwardStrategy, Forwarder, HeaderProjector};
pub use gate::{AuthFailure, AuthGate};
pub use registry::{ServiceDescriptor, ServiceRegistry};
pub use service::GatewayService;
pub use whitelist::WhitelistMatcher;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
