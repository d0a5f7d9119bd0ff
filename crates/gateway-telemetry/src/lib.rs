//! # Gateway Telemetry
//!
//! Structured logging and distributed tracing for the service gateway.
//!
//! ## Components
//!
//! - Console logs: human-readable in development, JSON lines in containers
//! - Traces: OpenTelemetry OTLP export, enabled by setting an endpoint
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).await.expect("Failed to init telemetry");
//!
//!     // Application code; logs and spans are now collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset | OTLP collector; no export when unset |
//! | `OTEL_SERVICE_NAME` | `api-gateway` | Service name in traces |
//! | `GW_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `GW_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `GW_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `GW_ENVIRONMENT` / `NODE_ENV` | `development` | Deployment environment |

mod config;
mod logging;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use logging::console_layer;
pub use tracing_setup::{env_filter, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize OpenTelemetry tracer: {0}")]
    TracerInit(String),

    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and, when configured, trace export.
///
/// Returns a guard that must be held for the lifetime of the application.
/// When dropped, it flushes pending spans.
pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let tracing_guard = tracing_setup::init_tracing(&config).await?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
    })
}

/// Guard that keeps telemetry active. Drop to flush and shutdown.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
