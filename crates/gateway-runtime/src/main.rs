//! # Gateway Runtime
//!
//! Entry point for the service gateway.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (console logs, optional OTLP export)
//! 2. Resolve configuration (defaults → `GW_CONFIG_FILE` → environment)
//! 3. Validate configuration and build the gateway (fails fast on a missing secret)
//! 4. Serve until SIGINT or SIGTERM, then drain in-flight requests

use anyhow::{Context, Result};
use api_gateway::GatewayService;
use gateway_runtime::load_config;
use gateway_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .await
        .context("Failed to initialize telemetry")?;

    let config = load_config(|key| std::env::var(key).ok())
        .context("Failed to resolve gateway configuration")?;

    info!("===========================================");
    info!("  Service Gateway v{}", api_gateway::VERSION);
    info!("===========================================");
    info!("Listen:   {}", config.http_addr());
    for service in &config.services {
        info!("Service:  /{} -> {}", service.prefix, service.url);
    }
    if config.errors.show_details || config.errors.show_stack {
        warn!(
            show_details = config.errors.show_details,
            show_stack = config.errors.show_stack,
            "Error internals are exposed to clients"
        );
    }

    let service = GatewayService::new(config).context("Failed to build gateway")?;
    service
        .start(shutdown_signal())
        .await
        .context("Gateway terminated with an error")?;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
