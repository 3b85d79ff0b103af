//! # Request Authenticator
//!
//! Runs one authentication pass over an inbound request:
//!
//! 1. strip any caller-supplied trust headers,
//! 2. read the `access_token` query parameter,
//! 3. resolve it through an [`AccessTokenResolver`],
//! 4. write `X-Caller-Id` / `X-Client-Id` onto the request.
//!
//! An absent request is modelled as `None` and is always a no-op. A token the
//! introspection service does not know (404) leaves the request anonymous
//! instead of failing it.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use axum::http::Request;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::auth::resolver::AccessTokenResolver;
use crate::core::error::RestResult;

/// `X-Public`: "true" marks a request that needs no identity
pub const HEADER_X_PUBLIC: HeaderName = HeaderName::from_static("x-public");
/// `X-Caller-Id`: end user id, base-10
pub const HEADER_X_CALLER_ID: HeaderName = HeaderName::from_static("x-caller-id");
/// `X-Client-Id`: calling application id, base-10
pub const HEADER_X_CLIENT_ID: HeaderName = HeaderName::from_static("x-client-id");

pub const PARAM_ACCESS_TOKEN: &str = "access_token";

/// Anything that carries the trust headers
pub trait TrustHeaders {
    fn headers(&self) -> &HeaderMap;
}

/// An inbound request the authenticator can rewrite
pub trait InboundRequest: TrustHeaders {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Raw query string, without the leading `?`
    fn query(&self) -> Option<&str>;

    /// First value of a decoded query parameter
    fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

impl TrustHeaders for HeaderMap {
    fn headers(&self) -> &HeaderMap {
        self
    }
}

impl<B> TrustHeaders for Request<B> {
    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }
}

impl<B> InboundRequest for Request<B> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        Request::headers_mut(self)
    }

    fn query(&self) -> Option<&str> {
        self.uri().query()
    }
}

/// True for an absent request or one whose `X-Public` is exactly `"true"`
pub fn is_public<R: TrustHeaders + ?Sized>(request: Option<&R>) -> bool {
    match request {
        None => true,
        Some(request) => request
            .headers()
            .get(HEADER_X_PUBLIC)
            .is_some_and(|value| value.as_bytes() == b"true"),
    }
}

/// Caller id from the trust header, 0 when absent or malformed
pub fn caller_id<R: TrustHeaders + ?Sized>(request: Option<&R>) -> i64 {
    header_id(request, &HEADER_X_CALLER_ID)
}

/// Client id from the trust header, 0 when absent or malformed
pub fn client_id<R: TrustHeaders + ?Sized>(request: Option<&R>) -> i64 {
    header_id(request, &HEADER_X_CLIENT_ID)
}

fn header_id<R: TrustHeaders + ?Sized>(request: Option<&R>, name: &HeaderName) -> i64 {
    request
        .and_then(|request| request.headers().get(name))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(0)
}

/// Remove both identity trust headers, whatever the caller sent
pub fn sanitize<R: InboundRequest + ?Sized>(request: Option<&mut R>) {
    if let Some(request) = request {
        let headers = request.headers_mut();
        headers.remove(HEADER_X_CLIENT_ID);
        headers.remove(HEADER_X_CALLER_ID);
    }
}

/// Resolved identity as seen by a handler behind the middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallerIdentity {
    pub caller_id: i64,
    pub client_id: i64,
    pub public: bool,
}

impl CallerIdentity {
    pub fn from_headers<R: TrustHeaders + ?Sized>(request: &R) -> Self {
        Self {
            caller_id: caller_id(Some(request)),
            client_id: client_id(Some(request)),
            public: is_public(Some(request)),
        }
    }

    /// No resolved identity
    pub fn is_anonymous(&self) -> bool {
        self.caller_id == 0 && self.client_id == 0
    }
}

/// Orchestrates sanitation, token resolution and header injection
#[derive(Clone)]
pub struct Authenticator {
    resolver: Arc<dyn AccessTokenResolver>,
}

impl Authenticator {
    pub fn new(resolver: Arc<dyn AccessTokenResolver>) -> Self {
        Self { resolver }
    }

    /// Authenticate a request in place
    ///
    /// `Ok(())` means the request may proceed, with identity headers set only
    /// when a token was resolved in this call. Any error other than a remote
    /// 404 is returned unchanged.
    pub async fn authenticate<R: InboundRequest + ?Sized>(
        &self,
        request: Option<&mut R>,
    ) -> RestResult<()> {
        let Some(request) = request else {
            return Ok(());
        };

        sanitize(Some(&mut *request));

        let token_id = request
            .query_param(PARAM_ACCESS_TOKEN)
            .map(|value| value.trim().to_string())
            .unwrap_or_default();
        if token_id.is_empty() {
            debug!("No access token on request, continuing anonymously");
            return Ok(());
        }

        let token = match self.resolver.resolve(&token_id).await {
            Ok(token) => token,
            Err(err) if err.is_not_found() => {
                debug!("Access token not recognised, continuing anonymously");
                return Ok(());
            }
            Err(err) => {
                warn!(status = err.status().as_u16(), "Authentication failed: {}", err);
                return Err(err);
            }
        };

        let headers = request.headers_mut();
        headers.append(HEADER_X_CALLER_ID, HeaderValue::from(token.caller_id));
        headers.append(HEADER_X_CLIENT_ID, HeaderValue::from(token.client_id));

        Ok(())
    }
}
