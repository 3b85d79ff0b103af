//! # Token Resolver
//!
//! Looks up an opaque access token identifier against the remote
//! introspection endpoint (`GET <base>/oauth/access_token/{id}`) and turns the
//! answer into an [`AccessToken`] or a [`RestError`].
//!
//! Every lookup produces exactly one of the two. Failures are first captured
//! as a [`ResolveFailure`] and then converted into the uniform error, except
//! for a well-formed remote error payload which is returned verbatim.

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::auth::transport::{HttpTransport, TransportError};
use crate::core::error::{RestError, RestResult};

pub const MSG_TRANSPORT_FAILURE: &str = "invalid response when trying to get access token";
pub const MSG_BODY_READ_FAILURE: &str = "invalid response when trying to parse body";
pub const MSG_UNPARSABLE_REMOTE_ERROR: &str = "invalid error interface when try get access token";
pub const MSG_UNMARSHAL_FAILURE: &str = "error when trying to unmarshal access token response";

/// Resolved identity of an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    #[serde(rename = "id")]
    pub token_id: String,

    #[serde(rename = "user_id")]
    pub caller_id: i64,

    pub client_id: i64,
}

/// Ways a lookup can go wrong before a verdict is reached
#[derive(Debug, Error)]
pub enum ResolveFailure {
    #[error("transport failure: {0}")]
    Transport(#[source] TransportError),

    #[error("body read failure: {0}")]
    BodyRead(#[source] TransportError),

    /// The remote service answered with its own classified error
    #[error("remote error: {0}")]
    Remote(RestError),

    #[error("unparsable remote error payload: {0}")]
    UnparsableRemoteError(#[source] serde_json::Error),

    #[error("access token response did not decode: {0}")]
    Unmarshal(#[source] serde_json::Error),
}

impl From<ResolveFailure> for RestError {
    fn from(failure: ResolveFailure) -> Self {
        match failure {
            ResolveFailure::Remote(err) => err,
            ResolveFailure::Transport(e) => RestError::internal_with_cause(MSG_TRANSPORT_FAILURE, e),
            ResolveFailure::BodyRead(e) => RestError::internal_with_cause(MSG_BODY_READ_FAILURE, e),
            ResolveFailure::UnparsableRemoteError(e) => {
                RestError::internal_with_cause(MSG_UNPARSABLE_REMOTE_ERROR, e)
            }
            ResolveFailure::Unmarshal(e) => RestError::internal_with_cause(MSG_UNMARSHAL_FAILURE, e),
        }
    }
}

/// Seam between the authenticator and whatever resolves tokens
#[async_trait]
pub trait AccessTokenResolver: Send + Sync {
    /// Resolve a non-empty token identifier
    async fn resolve(&self, token_id: &str) -> RestResult<AccessToken>;
}

/// Resolver backed by the remote introspection service
#[derive(Clone)]
pub struct RemoteTokenResolver {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
}

impl RemoteTokenResolver {
    /// Create a resolver for the service at `base_url`
    pub fn new(base_url: Url, transport: Arc<dyn HttpTransport>) -> RestResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(RestError::config(format!(
                "oauth base_url cannot carry a path: {}",
                base_url
            )));
        }

        Ok(Self { base_url, transport })
    }

    /// `<base>/oauth/access_token/{token_id}` with the id percent-encoded
    ///
    /// `.` and `..` are path navigation in any URL (even percent-encoded),
    /// so they cannot be embedded as an id.
    pub fn lookup_url(&self, token_id: &str) -> Result<Url, TransportError> {
        if token_id == "." || token_id == ".." {
            return Err(TransportError::other(
                "access token id cannot be used as a path segment",
            ));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::other("oauth base url cannot carry a path"))?
            .pop_if_empty()
            .extend(["oauth", "access_token", token_id]);
        Ok(url)
    }

    async fn lookup(&self, token_id: &str) -> Result<AccessToken, ResolveFailure> {
        let url = self.lookup_url(token_id).map_err(ResolveFailure::Transport)?;
        debug!("Looking up access token at {}", self.base_url);

        let response = self
            .transport
            .get(&url, HeaderMap::new())
            .await
            .map_err(ResolveFailure::Transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(ResolveFailure::BodyRead)?;

        if status.as_u16() > 299 {
            let remote = RestError::from_bytes(&body).map_err(ResolveFailure::UnparsableRemoteError)?;
            debug!(
                status = remote.status().as_u16(),
                "Introspection service rejected access token: {}",
                remote
            );
            return Err(ResolveFailure::Remote(remote));
        }

        serde_json::from_slice(&body).map_err(ResolveFailure::Unmarshal)
    }
}

#[async_trait]
impl AccessTokenResolver for RemoteTokenResolver {
    async fn resolve(&self, token_id: &str) -> RestResult<AccessToken> {
        self.lookup(token_id).await.map_err(|failure| {
            if !matches!(failure, ResolveFailure::Remote(_)) {
                warn!("Access token lookup failed: {}", failure);
            }
            RestError::from(failure)
        })
    }
}
