//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and trace export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name for traces and logs
    pub service_name: String,

    /// OTLP collector endpoint; trace export is off when unset
    pub otlp_endpoint: Option<String>,

    /// Log filter directive (`info`, `api_gateway=debug,info`, ...)
    pub log_level: String,

    /// Whether to write logs to stdout
    pub console_output: bool,

    /// JSON lines instead of human-readable output
    pub json_logs: bool,

    /// Deployment environment attached to exported spans
    pub environment: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "api-gateway".to_string(),
            otlp_endpoint: None,
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            environment: "development".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: api-gateway)
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector endpoint (default: unset, no export)
    /// - `GW_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `GW_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `GW_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `GW_ENVIRONMENT` or `NODE_ENV`: Deployment environment (default: development)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            service_name: lookup("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),

            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),

            log_level: lookup("GW_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            console_output: lookup("GW_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: lookup("GW_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            environment: lookup("GW_ENVIRONMENT")
                .or_else(|| lookup("NODE_ENV"))
                .unwrap_or(defaults.environment),
        }
    }

    /// Is trace export configured?
    pub fn exports_traces(&self) -> bool {
        self.otlp_endpoint.is_some()
    }
}
