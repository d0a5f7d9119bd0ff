//! Identity claims carried by a verified bearer token.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Accepted shape of the `email` claim
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Claims extracted from a verified token.
///
/// Unknown fields (including registered ones like `exp`, `iat`, `sub`) are
/// ignored. A single mistyped field rejects the whole claim set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Why a decoded payload was not accepted as claims
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimsError {
    #[error("claims do not match schema: {0}")]
    Schema(String),
    #[error("claim `id` is empty")]
    EmptyId,
    #[error("claim `email` is not a valid address")]
    InvalidEmail,
}

impl Claims {
    /// Minimal claim set
    pub fn new(id: impl Into<String>, email: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            roles,
            organization_id: None,
            tenant_id: None,
            employee_id: None,
            first_name: None,
            last_name: None,
            department: None,
            position: None,
            permissions: None,
            locale: None,
            timezone: None,
            last_login: None,
            is_active: None,
            metadata: None,
        }
    }

    /// Validate a verified token payload. All-or-nothing.
    pub fn from_payload(payload: Value) -> Result<Self, ClaimsError> {
        let claims: Claims =
            serde_json::from_value(payload).map_err(|e| ClaimsError::Schema(e.to_string()))?;

        if claims.id.trim().is_empty() {
            return Err(ClaimsError::EmptyId);
        }
        if !is_plausible_email(&claims.email) {
            return Err(ClaimsError::InvalidEmail);
        }

        Ok(claims)
    }
}

fn is_plausible_email(email: &str) -> bool {
    static EMAIL: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(EMAIL_PATTERN))
        .as_ref()
        .is_ok_and(|re| re.is_match(email))
}
