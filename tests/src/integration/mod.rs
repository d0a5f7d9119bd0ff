//! # Integration Flows
//!
//! The full router (request id, tracing, CORS, fault barrier, routing,
//! auth, forwarder) against mock backends on ephemeral ports.
//!
//! ## Flows Tested:
//!
//! 1. **Routing**: unknown prefixes and disallowed methods never reach a backend
//! 2. **Auth**: public paths, setup bypass, bearer tokens and claim projection
//! 3. **Forwarding**: query and body passthrough, multipart streaming,
//!    upstream failure translation, timeouts and client cancellation
//! 4. **Envelope**: every response is enveloped, internals hidden by default

pub mod auth;
pub mod envelope;
pub mod routing;
