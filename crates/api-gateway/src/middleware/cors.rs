//! CORS.
//!
//! Wrapper around tower-http CORS built from [`CorsConfig`].

use crate::domain::config::CorsConfig;
use crate::domain::request_id::REQUEST_ID_HEADER;
use axum::http::{HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};

/// Build the CORS layer, or `None` when CORS is disabled.
pub fn create_cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    if !config.enabled {
        return None;
    }

    let wildcard = |list: &[String]| list.iter().any(|v| v == "*");
    let mut cors = CorsLayer::new();

    // tower-http rejects `*` together with credentials, so mirror instead.
    cors = match (wildcard(&config.allowed_origins), config.allow_credentials) {
        (true, false) => cors.allow_origin(Any),
        (true, true) => cors.allow_origin(AllowOrigin::mirror_request()),
        (false, _) => {
            let origins: Vec<HeaderValue> = config
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            cors.allow_origin(origins)
        }
    };

    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| m.to_ascii_uppercase().parse().ok())
        .collect();
    cors = cors.allow_methods(methods);

    cors = match (wildcard(&config.allowed_headers), config.allow_credentials) {
        (true, false) => cors.allow_headers(Any),
        (true, true) => cors.allow_headers(AllowHeaders::mirror_request()),
        (false, _) => {
            let headers: Vec<HeaderName> = config
                .allowed_headers
                .iter()
                .filter_map(|h| h.parse().ok())
                .collect();
            cors.allow_headers(headers)
        }
    };

    cors = cors
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .max_age(Duration::from_secs(config.max_age));

    if config.allow_credentials {
        cors = cors.allow_credentials(true);
    }

    Some(cors)
}
