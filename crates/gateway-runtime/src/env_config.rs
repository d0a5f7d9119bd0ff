//! Gateway configuration from a JSON file and environment variables.
//!
//! Resolution order: built-in defaults, then `GW_CONFIG_FILE` (JSON,
//! partial documents allowed), then individual environment variables.
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `HOST`, `PORT` | Listener address (default `0.0.0.0:5001`) |
//! | `JWT_SECRET` | Token signing secret (required) |
//! | `SHOW_ERROR_DETAILS`, `SHOW_ERROR_STACK` | `true` exposes `error.details` / `error.stack` |
//! | `IDENTITY_SERVICE_URL` ... `NOTIFICATION_SERVICE_URL` | Backend base URLs |
//! | `<PREFIX>_PUBLIC_ENDPOINTS` | Comma-separated extra public paths per prefix |
//! | `GW_UPSTREAM_TIMEOUT`, `GW_CONNECT_TIMEOUT` | Outbound timeouts (`30s`, `500ms`, ...) |
//! | `GW_MAX_BODY_SIZE` | Buffered body limit in bytes |
//! | `GW_BYPASS_HEADER` | Setup bypass header name (default `x-setup-code`) |
//! | `GW_IDENTITY_PREFIX` | Prefix of the identity service (default `id`) |
//! | `GW_CORS_ORIGINS` | Comma-separated allowed origins |

use api_gateway::domain::config::parse_duration;
use api_gateway::GatewayConfig;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Backend prefix, its URL variable and the variables holding extra public paths
const SERVICE_VARS: &[(&str, &str, &[&str])] = &[
    ("id", "IDENTITY_SERVICE_URL", &["ID_PUBLIC_ENDPOINTS"]),
    ("emp", "EMPLOYEE_SERVICE_URL", &["EMP_PUBLIC_ENDPOINTS"]),
    ("rec", "RECRUITMENT_SERVICE_URL", &["REC_PUBLIC_ENDPOINTS"]),
    ("eng", "ENGAGEMENT_SERVICE_URL", &["ENG_PUBLIC_ENDPOINTS"]),
    ("perf", "PERFORMANCE_SERVICE_URL", &["PERF_PUBLIC_ENDPOINTS"]),
    ("nt", "NOTIFICATION_SERVICE_URL", &["NT_PUBLIC_ENDPOINTS", "NOTIF_PUBLIC_ENDPOINTS"]),
];

/// Environment configuration errors
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read config file {path}: {reason}")]
    File { path: String, reason: String },
}

/// Resolve the gateway configuration.
///
/// `lookup` returns the value of an environment variable; the binary passes
/// `std::env::var`, tests pass a map.
pub fn load_config<F>(lookup: F) -> Result<GatewayConfig, EnvError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup("GW_CONFIG_FILE") {
        Some(path) => read_file(Path::new(&path))?,
        None => GatewayConfig::default(),
    };

    if let Some(host) = lookup("HOST") {
        config.http.host = parse("HOST", &host, |v| v.parse().map_err(|e| format!("{}", e)))?;
    }
    if let Some(port) = lookup("PORT") {
        config.http.port = parse("PORT", &port, |v| v.parse().map_err(|e| format!("{}", e)))?;
    }

    if let Some(secret) = lookup("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }
    if let Some(header) = lookup("GW_BYPASS_HEADER") {
        config.auth.bypass_header = header.trim().to_ascii_lowercase();
    }
    if let Some(prefix) = lookup("GW_IDENTITY_PREFIX") {
        config.auth.identity_prefix = prefix.trim().to_string();
    }

    if let Some(v) = lookup("SHOW_ERROR_DETAILS") {
        config.errors.show_details = is_true(&v);
    }
    if let Some(v) = lookup("SHOW_ERROR_STACK") {
        config.errors.show_stack = is_true(&v);
    }

    if let Some(v) = lookup("GW_UPSTREAM_TIMEOUT") {
        config.timeouts.upstream = parse("GW_UPSTREAM_TIMEOUT", &v, |v| {
            parse_duration(v).map_err(str::to_string)
        })?;
    }
    if let Some(v) = lookup("GW_CONNECT_TIMEOUT") {
        config.timeouts.connect = parse("GW_CONNECT_TIMEOUT", &v, |v| {
            parse_duration(v).map_err(str::to_string)
        })?;
    }
    if let Some(v) = lookup("GW_MAX_BODY_SIZE") {
        config.limits.max_body_size =
            parse("GW_MAX_BODY_SIZE", &v, |v| v.parse().map_err(|e| format!("{}", e)))?;
    }

    if let Some(origins) = lookup("GW_CORS_ORIGINS") {
        let origins = split_list(&origins);
        if !origins.is_empty() {
            config.cors.allowed_origins = origins;
        }
    }

    apply_service_vars(&mut config, &lookup);

    Ok(config)
}

/// Backend URLs and per-prefix public paths
fn apply_service_vars<F>(config: &mut GatewayConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    for &(prefix, url_var, public_vars) in SERVICE_VARS {
        if let Some(url) = lookup(url_var) {
            match config.services.iter_mut().find(|s| s.prefix == prefix) {
                Some(service) => service.url = url.trim().to_string(),
                None => warn!(prefix, var = url_var, "URL set for a service that is not configured"),
            }
        }

        for &var in public_vars {
            let Some(raw) = lookup(var) else { continue };
            let patterns = split_list(&raw);
            if patterns.is_empty() {
                continue;
            }
            info!(prefix, var, count = patterns.len(), "Extra public endpoints");
            let entry = config.whitelist.extra.entry(prefix.to_string()).or_default();
            for pattern in patterns {
                if !entry.contains(&pattern) {
                    entry.push(pattern);
                }
            }
        }
    }
}

fn read_file(path: &Path) -> Result<GatewayConfig, EnvError> {
    let file_err = |reason: String| EnvError::File {
        path: path.display().to_string(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| file_err(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| file_err(e.to_string()))
}

fn parse<T>(
    var: &'static str,
    value: &str,
    parser: impl FnOnce(&str) -> Result<T, String>,
) -> Result<T, EnvError> {
    parser(value.trim()).map_err(|reason| EnvError::Invalid {
        var,
        value: value.to_string(),
        reason,
    })
}

fn is_true(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
