//! Gateway configuration with validation.
//!
//! The gateway consumes a fully resolved [`GatewayConfig`]; reading the
//! process environment is the runtime binary's job.

use axum::http::HeaderName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default HTTP methods every catalogue service accepts.
pub const DEFAULT_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener configuration
    pub http: HttpConfig,
    /// Backend service candidates (validated by the registry at load time)
    pub services: Vec<ServiceConfig>,
    /// Token verification and bypass settings
    pub auth: AuthConfig,
    /// Additional public paths per service prefix
    pub whitelist: WhitelistConfig,
    /// Error detail visibility
    pub errors: ErrorsConfig,
    /// Outbound call timeouts
    pub timeouts: TimeoutConfig,
    /// Inbound request limits
    pub limits: LimitsConfig,
    /// CORS configuration
    pub cors: CorsConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            services: ServiceConfig::catalogue(),
            auth: AuthConfig::default(),
            whitelist: WhitelistConfig::default(),
            errors: ErrorsConfig::default(),
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        if self.auth.identity_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "identity_prefix cannot be empty".into(),
            ));
        }

        if HeaderName::from_bytes(self.auth.bypass_header.as_bytes()).is_err() {
            return Err(ConfigError::InvalidHeader(self.auth.bypass_header.clone()));
        }

        if self.timeouts.upstream.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "upstream timeout cannot be 0".into(),
            ));
        }

        if self.timeouts.connect.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "connect timeout cannot be 0".into(),
            ));
        }

        if self.limits.max_body_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_body_size cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 5001)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 5001,
        }
    }
}

/// One backend service candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// First path segment routed to this service
    pub prefix: String,
    /// Backend base URL
    pub url: String,
    /// Accepted HTTP methods
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,
    /// Carried for backends and operators; never enforced here
    #[serde(default)]
    pub rate_limit: Option<RateLimitHint>,
}

impl ServiceConfig {
    pub fn new(prefix: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            url: url.into(),
            methods: default_methods(),
            rate_limit: Some(RateLimitHint::default()),
        }
    }

    /// Replace the accepted methods
    pub fn with_methods<I, M>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Default deployment: identity plus the five domain services.
    pub fn catalogue() -> Vec<Self> {
        vec![
            Self::new("id", "http://localhost:5002"),
            Self::new("emp", "http://localhost:5003"),
            Self::new("rec", "http://localhost:5004"),
            Self::new("eng", "http://localhost:5005"),
            Self::new("perf", "http://localhost:5006"),
            Self::new("nt", "http://localhost:5010"),
        ]
    }
}

fn default_methods() -> Vec<String> {
    DEFAULT_METHODS.iter().map(|m| m.to_string()).collect()
}

/// Per-service rate-limit hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitHint {
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    pub max: u32,
}

impl Default for RateLimitHint {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(15 * 60),
            max: 100,
        }
    }
}

/// Token verification configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret (required)
    pub jwt_secret: String,
    /// Header whose presence skips authentication
    pub bypass_header: String,
    /// Prefix of the identity backend, which receives the raw credentials
    pub identity_prefix: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            bypass_header: "x-setup-code".to_string(),
            identity_prefix: "id".to_string(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("bypass_header", &self.bypass_header)
            .field("identity_prefix", &self.identity_prefix)
            .finish()
    }
}

/// Public path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitelistConfig {
    /// Seed the identity prefix with the built-in public auth routes
    pub include_defaults: bool,
    /// Extra literal paths or globs, keyed by service prefix
    pub extra: BTreeMap<String, Vec<String>>,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            include_defaults: true,
            extra: BTreeMap::new(),
        }
    }
}

/// Error visibility switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorsConfig {
    /// Include `error.details` in envelopes
    pub show_details: bool,
    /// Include `error.stack` in envelopes
    pub show_stack: bool,
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole outbound call, response body included
    #[serde(with = "humantime_serde")]
    pub upstream: Duration,
    /// TCP connect to a backend
    #[serde(with = "humantime_serde")]
    pub connect: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            upstream: Duration::from_secs(30),
            connect: Duration::from_secs(5),
        }
    }
}

/// Request limits configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Max buffered request body in bytes (default: 10MB)
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
    /// Allowed methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers ("*" for all)
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache, in seconds
    pub max_age: u64,
    /// Allow credentials
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "PUT".to_string(),
                "PATCH".to_string(),
                "DELETE".to_string(),
                "OPTIONS".to_string(),
            ],
            allowed_headers: vec!["*".to_string()],
            max_age: 86400, // 24 hours
            allow_credentials: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// No token signing secret configured
    #[error("jwt_secret must be set")]
    MissingSecret,
    /// Bypass header is not a valid header name
    #[error("invalid header name: {0}")]
    InvalidHeader(String),
    /// Invalid size limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Parse "30s", "1500ms", "15m" or bare seconds.
pub fn parse_duration(s: &str) -> Result<Duration, &'static str> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| "invalid milliseconds")
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| "invalid seconds")
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .map(|m| Duration::from_secs(m * 60))
            .map_err(|_| "invalid minutes")
    } else {
        s.parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| "invalid duration format")
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
