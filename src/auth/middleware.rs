//! # Authentication Middleware
//!
//! Hooks the [`Authenticator`] into an axum router. Each request is
//! authenticated in place before it reaches the handler; a failed resolution
//! is turned into a response carrying the error's own status and JSON body.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/whoami", get(whoami))
//!     .layer(middleware::from_fn_with_state(authenticator, authenticate_request));
//! ```

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use std::sync::Arc;

use crate::auth::authenticator::{Authenticator, CallerIdentity};

/// Axum middleware function for authentication
pub async fn authenticate_request(
    State(authenticator): State<Arc<Authenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticator.authenticate(Some(&mut request)).await {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

/// Handlers can take the identity the middleware left on the request
#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CallerIdentity::from_headers(&parts.headers))
    }
}
