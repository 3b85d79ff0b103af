//! # Error Handling Module
//!
//! This module defines the single uniform error value used throughout the
//! interceptor. Every failure path (transport, body read, remote error payload,
//! malformed response) ends up as a [`RestError`] carrying an HTTP status code,
//! a human-readable message and the lower-level causes for diagnostics.
//!
//! The serialized form of a [`RestError`] is also the wire shape the remote
//! introspection service uses for its own error responses:
//!
//! ```json
//! {"message": "access token not found", "status": 404, "error": "not_found", "causes": null}
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type used throughout the interceptor
pub type RestResult<T> = Result<T, RestError>;

/// Shared lower-level error kept for diagnostics
pub type ErrorSource = Arc<dyn StdError + Send + Sync + 'static>;

/// Uniform status + message + cause error value
///
/// Exactly one of these is produced by any failing operation in the
/// authentication flow. The `source` is never serialized; `causes` holds its
/// textual form so the error survives a round trip over the wire.
#[derive(Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct RestError {
    message: String,

    #[serde(with = "status_code")]
    status: StatusCode,

    #[serde(default)]
    error: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    causes: Vec<String>,

    #[serde(skip)]
    #[source]
    source: Option<ErrorSource>,
}

impl RestError {
    /// Create an error with an explicit status and label
    pub fn new<S: Into<String>>(status: StatusCode, message: S, error: &str) -> Self {
        Self {
            message: message.into(),
            status,
            error: error.to_string(),
            causes: Vec::new(),
            source: None,
        }
    }

    /// Create a 400 error
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "bad_request")
    }

    /// Create a 404 error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "not_found")
    }

    /// Create a 401 error
    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "unauthorized")
    }

    /// Create a 500 error without a nested cause
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            "internal_server_error",
        )
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            "configuration_error",
        )
    }

    /// Create a 500 error that nests the lower-level failure
    pub fn internal_with_cause<S, E>(message: S, cause: E) -> Self
    where
        S: Into<String>,
        E: StdError + Send + Sync + 'static,
    {
        Self::internal(message).with_cause(cause)
    }

    /// Attach a lower-level cause, recording its text in `causes`
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.causes.push(cause.to_string());
        self.source = Some(Arc::new(cause));
        self
    }

    /// Parse a remote error payload
    ///
    /// Fails when the body is not JSON, lacks `message`/`status`, or carries a
    /// status outside the valid HTTP range.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Short machine-readable label such as `not_found`
    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn causes(&self) -> &[String] {
        &self.causes
    }

    /// Check whether this error means "the thing does not exist"
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

impl fmt::Debug for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestError")
            .field("message", &self.message)
            .field("status", &self.status.as_u16())
            .field("error", &self.error)
            .field("causes", &self.causes)
            .finish()
    }
}

impl PartialEq for RestError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
            && self.status == other.status
            && self.error == other.error
            && self.causes == other.causes
    }
}

impl Eq for RestError {}

/// Reject a request with the error's own status and JSON body
///
/// Causes of server errors describe internal failures and stay on the
/// value for logging; they are not sent to the client.
impl IntoResponse for RestError {
    fn into_response(mut self) -> Response {
        if self.status.is_server_error() {
            self.causes.clear();
        }
        (self.status, Json(self)).into_response()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

mod status_code {
    use super::*;

    pub fn serialize<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(status.as_u16())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StatusCode, D::Error> {
        let code = u16::deserialize(deserializer)?;
        StatusCode::from_u16(code).map_err(serde::de::Error::custom)
    }
}
