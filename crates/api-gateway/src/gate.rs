//! Authentication gate.
//!
//! ```text
//! START → WHITELIST_CHECK ──public──────────────────────────────→ PASS
//!               │
//!               └→ SETUP_BYPASS_CHECK ──bypass header───────────→ PASS
//!                        │
//!                        └→ BEARER_CHECK ──missing/malformed────→ FAIL
//!                                │
//!                                └→ TOKEN_VERIFY ──bad/expired──→ FAIL
//!                                        │
//!                                        └→ CLAIM_VALIDATE ─────→ FAIL
//!                                                │
//!                                                └→ AUTHENTICATED
//! ```
//!
//! Every transition is synchronous; a failure never reaches a backend.

use crate::domain::claims::{Claims, ClaimsError};
use crate::domain::config::AuthConfig;
use crate::domain::context::{Passage, RequestContext};
use crate::domain::error::ApiError;
use crate::whitelist::WhitelistMatcher;
use axum::http::{header, HeaderMap, HeaderName};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use std::sync::Arc;
use tracing::{trace, warn};

/// Gate states
#[derive(Debug, Clone, PartialEq)]
pub enum GateState {
    Start,
    WhitelistCheck,
    SetupBypassCheck,
    BearerCheck,
    TokenVerify(String),
    ClaimValidate(Value),
}

enum Step {
    Next(GateState),
    Pass(Passage),
}

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("no bearer token provided")]
    MissingToken,
    #[error("authorization header is not a bearer token")]
    MalformedHeader,
    #[error("token has expired")]
    Expired,
    #[error("token rejected: {0}")]
    InvalidToken(String),
    #[error(transparent)]
    InvalidClaims(#[from] ClaimsError),
}

impl AuthFailure {
    /// Client-facing form
    pub fn to_api_error(&self) -> ApiError {
        match self {
            Self::MissingToken => ApiError::unauthorized("No token provided"),
            Self::MalformedHeader => ApiError::unauthorized("Invalid authorization header"),
            Self::Expired => ApiError::token_expired(),
            Self::InvalidToken(reason) => {
                ApiError::unauthorized("Invalid token").with_details(reason.clone())
            }
            Self::InvalidClaims(reason) => {
                ApiError::unauthorized("Invalid token payload").with_details(reason.to_string())
            }
        }
    }
}

/// Authentication state machine
pub struct AuthGate {
    whitelist: Arc<WhitelistMatcher>,
    decoding_key: DecodingKey,
    validation: Validation,
    bypass_header: HeaderName,
}

impl AuthGate {
    pub fn new(
        config: &AuthConfig,
        whitelist: Arc<WhitelistMatcher>,
    ) -> Result<Self, crate::domain::config::ConfigError> {
        let bypass_header = HeaderName::from_bytes(config.bypass_header.as_bytes())
            .map_err(|_| crate::domain::config::ConfigError::InvalidHeader(config.bypass_header.clone()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_aud = false;
        // `exp` is optional; when present it is enforced
        validation.set_required_spec_claims(&[] as &[&str]);

        Ok(Self {
            whitelist,
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            bypass_header,
        })
    }

    pub fn bypass_header(&self) -> &HeaderName {
        &self.bypass_header
    }

    /// Run the state machine to completion
    pub fn evaluate(
        &self,
        ctx: &RequestContext,
        headers: &HeaderMap,
    ) -> Result<Passage, AuthFailure> {
        let mut state = GateState::Start;
        loop {
            trace!(request_id = %ctx.request_id, state = ?state_name(&state), "Auth gate transition");
            match self.step(state, ctx, headers)? {
                Step::Next(next) => state = next,
                Step::Pass(passage) => return Ok(passage),
            }
        }
    }

    fn step(
        &self,
        state: GateState,
        ctx: &RequestContext,
        headers: &HeaderMap,
    ) -> Result<Step, AuthFailure> {
        match state {
            GateState::Start => Ok(Step::Next(GateState::WhitelistCheck)),

            GateState::WhitelistCheck => {
                if self.whitelist.is_public(&ctx.service_prefix, &ctx.service_path) {
                    Ok(Step::Pass(Passage::Public))
                } else {
                    Ok(Step::Next(GateState::SetupBypassCheck))
                }
            }

            GateState::SetupBypassCheck => {
                if headers.contains_key(&self.bypass_header) {
                    warn!(
                        request_id = %ctx.request_id,
                        service = %ctx.service_prefix,
                        path = %ctx.original_path,
                        header = %self.bypass_header,
                        "Authentication bypassed by setup header"
                    );
                    Ok(Step::Pass(Passage::Bypass))
                } else {
                    Ok(Step::Next(GateState::BearerCheck))
                }
            }

            GateState::BearerCheck => {
                let token = bearer_token(headers)?;
                Ok(Step::Next(GateState::TokenVerify(token.to_string())))
            }

            GateState::TokenVerify(token) => {
                let data = jsonwebtoken::decode::<Value>(&token, &self.decoding_key, &self.validation)
                    .map_err(|e| match e.kind() {
                        ErrorKind::ExpiredSignature => AuthFailure::Expired,
                        _ => AuthFailure::InvalidToken(e.to_string()),
                    })?;
                Ok(Step::Next(GateState::ClaimValidate(data.claims)))
            }

            GateState::ClaimValidate(payload) => {
                let claims = Claims::from_payload(payload)?;
                Ok(Step::Pass(Passage::Authenticated(Arc::new(claims))))
            }
        }
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("bypass_header", &self.bypass_header)
            .field("whitelist", &self.whitelist)
            .finish_non_exhaustive()
    }
}

fn state_name(state: &GateState) -> &'static str {
    match state {
        GateState::Start => "START",
        GateState::WhitelistCheck => "WHITELIST_CHECK",
        GateState::SetupBypassCheck => "SETUP_BYPASS_CHECK",
        GateState::BearerCheck => "BEARER_CHECK",
        GateState::TokenVerify(_) => "TOKEN_VERIFY",
        GateState::ClaimValidate(_) => "CLAIM_VALIDATE",
    }
}

/// Extract the token from `Authorization: Bearer <token>`
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthFailure> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthFailure::MissingToken)?
        .to_str()
        .map_err(|_| AuthFailure::MalformedHeader)?
        .trim();

    let (scheme, token) = raw.split_once(' ').ok_or(AuthFailure::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthFailure::MalformedHeader);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthFailure::MalformedHeader);
    }
    Ok(token)
}
