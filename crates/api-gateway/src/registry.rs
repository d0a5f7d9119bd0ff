//! Service registry: validated backend descriptors keyed by path prefix.
//!
//! Built once at startup and shared read-only behind an `Arc`.

use crate::domain::config::{RateLimitHint, ServiceConfig};
use axum::http::Method;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A validated backend service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// `<prefix>-service`
    pub name: String,
    pub prefix: String,
    /// Base URL without trailing slash
    pub base_url: String,
    pub allowed_methods: Vec<Method>,
    pub rate_limit: Option<RateLimitHint>,
}

impl ServiceDescriptor {
    /// Validate one candidate
    pub fn from_config(config: &ServiceConfig) -> Result<Self, RegistryError> {
        let prefix = config.prefix.trim().trim_matches('/');
        if prefix.is_empty() || prefix.contains('/') {
            return Err(RegistryError::InvalidPrefix(config.prefix.clone()));
        }

        let url = config.url.trim();
        if url.is_empty() {
            return Err(RegistryError::EmptyUrl(prefix.to_string()));
        }
        let parsed = Url::parse(url).map_err(|e| RegistryError::InvalidUrl {
            prefix: prefix.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RegistryError::InvalidUrl {
                prefix: prefix.to_string(),
                reason: format!("unsupported scheme `{}`", parsed.scheme()),
            });
        }

        let mut allowed_methods = Vec::with_capacity(config.methods.len());
        for raw in &config.methods {
            let method = Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| RegistryError::InvalidMethod {
                    prefix: prefix.to_string(),
                    method: raw.clone(),
                })?;
            if !allowed_methods.contains(&method) {
                allowed_methods.push(method);
            }
        }
        if allowed_methods.is_empty() {
            return Err(RegistryError::NoMethods(prefix.to_string()));
        }

        Ok(Self {
            name: format!("{}-service", prefix),
            prefix: prefix.to_string(),
            base_url: url.trim_end_matches('/').to_string(),
            allowed_methods,
            rate_limit: config.rate_limit,
        })
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }
}

/// Immutable prefix → descriptor map
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    by_prefix: HashMap<String, Arc<ServiceDescriptor>>,
    ordered: Vec<Arc<ServiceDescriptor>>,
}

impl ServiceRegistry {
    /// Validate every candidate, dropping invalid ones with a warning.
    ///
    /// The first candidate wins when two share a prefix.
    pub fn load(candidates: &[ServiceConfig]) -> Self {
        let mut registry = Self::default();

        for candidate in candidates {
            let descriptor = match ServiceDescriptor::from_config(candidate) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!(prefix = %candidate.prefix, error = %e, "Skipping invalid service configuration");
                    continue;
                }
            };

            if registry.by_prefix.contains_key(&descriptor.prefix) {
                warn!(prefix = %descriptor.prefix, "Skipping duplicate service prefix");
                continue;
            }

            debug!(
                service = %descriptor.name,
                url = %descriptor.base_url,
                methods = ?descriptor.allowed_methods,
                "Registered service"
            );
            let descriptor = Arc::new(descriptor);
            registry
                .by_prefix
                .insert(descriptor.prefix.clone(), Arc::clone(&descriptor));
            registry.ordered.push(descriptor);
        }

        registry
    }

    /// Look up the descriptor owning `prefix`
    pub fn resolve(&self, prefix: &str) -> Result<Arc<ServiceDescriptor>, RegistryError> {
        self.by_prefix
            .get(prefix)
            .cloned()
            .ok_or_else(|| RegistryError::NotConfigured(prefix.to_string()))
    }

    pub fn is_method_allowed(descriptor: &ServiceDescriptor, method: &Method) -> bool {
        descriptor.allows(method)
    }

    /// Configured services in load order
    pub fn services(&self) -> impl Iterator<Item = &Arc<ServiceDescriptor>> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("service {0} is not configured")]
    NotConfigured(String),
    #[error("invalid service prefix `{0}`")]
    InvalidPrefix(String),
    #[error("service {0} has an empty url")]
    EmptyUrl(String),
    #[error("service {prefix} has an invalid url: {reason}")]
    InvalidUrl { prefix: String, reason: String },
    #[error("service {prefix} lists invalid method `{method}`")]
    InvalidMethod { prefix: String, method: String },
    #[error("service {0} allows no methods")]
    NoMethods(String),
}
