//! # Transport Adapter
//!
//! A single outbound HTTP GET behind the [`HttpTransport`] capability. The
//! token resolver only ever sees this trait, so tests can substitute a
//! deterministic stub for the network.
//!
//! The adapter never classifies failures; it reports them as
//! [`TransportError`] and leaves the mapping to the caller.

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Transport-level failures (DNS, refused connection, timeout, broken body)
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid status code {0} in response")]
    InvalidStatus(u16),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }
}

/// A raw response whose body has not been read yet
pub struct TransportResponse {
    status: StatusCode,
    body: BoxFuture<'static, Result<Bytes, TransportError>>,
}

impl TransportResponse {
    /// Wrap a status and a deferred body read
    pub fn new<F>(status: StatusCode, body: F) -> Self
    where
        F: Future<Output = Result<Bytes, TransportError>> + Send + 'static,
    {
        Self {
            status,
            body: body.boxed(),
        }
    }

    /// Response with a body that is already in memory
    pub fn from_bytes<B: Into<Bytes>>(status: StatusCode, body: B) -> Self {
        let body = body.into();
        Self::new(status, async move { Ok(body) })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Read the full body
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        self.body.await
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Capability to perform exactly one GET per call, no retries
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &Url, headers: HeaderMap) -> Result<TransportResponse, TransportError>;
}

/// Production transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client whose whole-request timeout is `timeout`
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    /// Use an already configured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url, headers: HeaderMap) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.get(url.as_str());
        for (name, value) in headers.iter() {
            request = request.header(name.as_str(), value.as_bytes());
        }

        // The lookup URL carries the token id; keep it out of error text
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Request(e.without_url()))?;

        // reqwest and axum sit on different `http` major versions
        let code = response.status().as_u16();
        let status = StatusCode::from_u16(code).map_err(|_| TransportError::InvalidStatus(code))?;

        Ok(TransportResponse::new(status, async move {
            response
                .bytes()
                .await
                .map_err(|e| TransportError::Request(e.without_url()))
        }))
    }
}
