//! # OAuth Interceptor
//!
//! Request authentication for internal services. For each inbound request the
//! interceptor decides whether it stays anonymous or carries a caller identity
//! resolved from an opaque `access_token` query parameter, and writes that
//! identity onto the request as trusted headers (`X-Caller-Id`,
//! `X-Client-Id`) before business logic runs.
//!
//! The flow is:
//! inbound request → [`Authenticator`] → [`RemoteTokenResolver`] →
//! [`HttpTransport`] → introspection service.

/// Error type, error classification and configuration
pub mod core;

/// Token resolution, request authentication and the axum middleware
pub mod auth;

/// Logging setup
pub mod observability;

pub use crate::auth::{
    authenticate_request, caller_id, client_id, is_public, sanitize, AccessToken,
    AccessTokenResolver, Authenticator, CallerIdentity, HttpTransport, RemoteTokenResolver,
    ReqwestTransport,
};
pub use crate::core::config::InterceptorConfig;
pub use crate::core::error::{RestError, RestResult};
