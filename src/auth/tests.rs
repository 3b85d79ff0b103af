//! # Authentication Flow Tests
//!
//! Exercises the resolver and the authenticator against a deterministic stub
//! transport, covering every branch of the lookup and the header rewriting.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use serde_json::json;
use url::Url;

use crate::auth::authenticator::{
    caller_id, client_id, is_public, sanitize, Authenticator, CallerIdentity, HEADER_X_CALLER_ID,
    HEADER_X_CLIENT_ID, HEADER_X_PUBLIC,
};
use crate::auth::resolver::{
    AccessToken, AccessTokenResolver, RemoteTokenResolver, MSG_BODY_READ_FAILURE,
    MSG_TRANSPORT_FAILURE, MSG_UNMARSHAL_FAILURE, MSG_UNPARSABLE_REMOTE_ERROR,
};
use crate::auth::transport::{HttpTransport, TransportError, TransportResponse};
use crate::core::error::RestError;

type Respond = dyn Fn() -> Result<TransportResponse, TransportError> + Send + Sync;

/// Transport that answers every call with a canned response
struct StubTransport {
    respond: Box<Respond>,
    calls: Mutex<Vec<Url>>,
}

impl StubTransport {
    fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn() -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn json(status: StatusCode, body: serde_json::Value) -> Arc<Self> {
        Self::new(move || Ok(TransportResponse::from_bytes(status, body.to_string())))
    }

    fn raw(status: StatusCode, body: &'static str) -> Arc<Self> {
        Self::new(move || Ok(TransportResponse::from_bytes(status, body)))
    }

    fn failing() -> Arc<Self> {
        Self::new(|| Err(TransportError::other("Error on purpose")))
    }

    fn calls(&self) -> Vec<Url> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn get(&self, url: &Url, _headers: HeaderMap) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push(url.clone());
        (self.respond)()
    }
}

fn resolver(transport: Arc<StubTransport>) -> RemoteTokenResolver {
    let base = Url::parse("http://oauth.test:8081").unwrap();
    RemoteTokenResolver::new(base, transport).unwrap()
}

fn authenticator(transport: Arc<StubTransport>) -> Authenticator {
    Authenticator::new(Arc::new(resolver(transport)))
}

fn request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn token_123() -> serde_json::Value {
    json!({"id": "123", "user_id": 123, "client_id": 123})
}

// --- accessors -------------------------------------------------------------

#[test]
fn test_is_public() {
    assert!(is_public::<Request<Body>>(None));
    assert!(!is_public(Some(&request("/"))));

    let cases = [("true", true), ("false", false), ("True", false), ("1", false), ("", false)];
    for (value, expected) in cases {
        let mut req = request("/");
        req.headers_mut()
            .insert(HEADER_X_PUBLIC, HeaderValue::from_static(value));
        assert_eq!(is_public(Some(&req)), expected, "X-Public: {:?}", value);
    }
}

#[test]
fn test_identity_accessors() {
    assert_eq!(caller_id::<Request<Body>>(None), 0);
    assert_eq!(client_id::<Request<Body>>(None), 0);
    assert_eq!(caller_id(Some(&request("/"))), 0);
    assert_eq!(client_id(Some(&request("/"))), 0);

    let mut req = request("/");
    req.headers_mut()
        .insert(HEADER_X_CALLER_ID, HeaderValue::from_static("123"));
    req.headers_mut()
        .insert(HEADER_X_CLIENT_ID, HeaderValue::from_static("NotInt"));
    assert_eq!(caller_id(Some(&req)), 123);
    assert_eq!(client_id(Some(&req)), 0);

    req.headers_mut()
        .insert(HEADER_X_CLIENT_ID, HeaderValue::from_static("-9223372036854775808"));
    assert_eq!(client_id(Some(&req)), i64::MIN);
}

#[test]
fn test_accessors_are_case_insensitive_on_names() {
    let mut headers = HeaderMap::new();
    headers.insert("X-Caller-Id", HeaderValue::from_static("7"));
    headers.insert("X-PUBLIC", HeaderValue::from_static("true"));

    let identity = CallerIdentity::from_headers(&headers);
    assert_eq!(identity.caller_id, 7);
    assert!(identity.public);
    assert!(!identity.is_anonymous());
}

#[test]
fn test_sanitize() {
    sanitize::<Request<Body>>(None);

    let mut req = request("/");
    sanitize(Some(&mut req));
    assert!(req.headers().is_empty());

    req.headers_mut()
        .append(HEADER_X_CLIENT_ID, HeaderValue::from_static("NotInt"));
    req.headers_mut()
        .append(HEADER_X_CALLER_ID, HeaderValue::from_static("1"));
    req.headers_mut()
        .append(HEADER_X_CALLER_ID, HeaderValue::from_static("2"));
    req.headers_mut()
        .insert(HEADER_X_PUBLIC, HeaderValue::from_static("true"));
    sanitize(Some(&mut req));

    assert!(req.headers().get(HEADER_X_CLIENT_ID).is_none());
    assert!(req.headers().get(HEADER_X_CALLER_ID).is_none());
    assert!(is_public(Some(&req)));
}

// --- resolver --------------------------------------------------------------

#[tokio::test]
async fn test_resolve_success() {
    let transport = StubTransport::json(StatusCode::OK, token_123());
    let token = resolver(transport.clone()).resolve("123").await.unwrap();

    assert_eq!(
        token,
        AccessToken {
            token_id: "123".to_string(),
            caller_id: 123,
            client_id: 123,
        }
    );
    assert_eq!(
        transport.calls(),
        vec![Url::parse("http://oauth.test:8081/oauth/access_token/123").unwrap()]
    );
}

#[tokio::test]
async fn test_resolve_transport_failure() {
    let err = resolver(StubTransport::failing()).resolve("123").await.unwrap_err();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.message(), MSG_TRANSPORT_FAILURE);
}

#[tokio::test]
async fn test_resolve_body_read_failure() {
    let transport = StubTransport::new(|| {
        Ok(TransportResponse::new(StatusCode::OK, async {
            Err(TransportError::other("connection reset"))
        }))
    });

    let err = resolver(transport).resolve("123").await.unwrap_err();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.message(), MSG_BODY_READ_FAILURE);
    assert_eq!(err.causes(), ["connection reset".to_string()]);
}

#[tokio::test]
async fn test_resolve_unparsable_remote_error() {
    let transport = StubTransport::raw(StatusCode::INTERNAL_SERVER_ERROR, "not json");
    let err = resolver(transport).resolve("123").await.unwrap_err();

    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.message(), MSG_UNPARSABLE_REMOTE_ERROR);
}

#[tokio::test]
async fn test_resolve_unmarshal_failure() {
    let transport = StubTransport::raw(StatusCode::OK, "not json");
    let err = resolver(transport).resolve("123").await.unwrap_err();

    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.message(), MSG_UNMARSHAL_FAILURE);
}

#[tokio::test]
async fn test_resolve_passes_remote_error_through() {
    let remote = RestError::bad_request("Error on purpose");
    let transport = StubTransport::json(
        StatusCode::INTERNAL_SERVER_ERROR,
        serde_json::to_value(&remote).unwrap(),
    );

    let err = resolver(transport).resolve("123").await.unwrap_err();
    assert_eq!(err, remote);
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_redirect_status_counts_as_error() {
    let transport = StubTransport::json(StatusCode::MOVED_PERMANENTLY, token_123());
    let err = resolver(transport).resolve("123").await.unwrap_err();
    assert_eq!(err.message(), MSG_UNPARSABLE_REMOTE_ERROR);
}

#[tokio::test]
async fn test_any_2xx_is_success() {
    let transport = StubTransport::json(StatusCode::ACCEPTED, token_123());
    assert!(resolver(transport).resolve("123").await.is_ok());
}

#[test]
fn test_lookup_url_encodes_token_and_keeps_base_path() {
    let base = Url::parse("http://oauth.test/api/").unwrap();
    let resolver = RemoteTokenResolver::new(base, StubTransport::failing()).unwrap();

    assert_eq!(
        resolver.lookup_url("a/b c").unwrap().as_str(),
        "http://oauth.test/api/oauth/access_token/a%2Fb%20c"
    );
    assert_eq!(
        resolver.lookup_url("...").unwrap().as_str(),
        "http://oauth.test/api/oauth/access_token/..."
    );
    assert!(resolver.lookup_url(".").is_err());
    assert!(resolver.lookup_url("..").is_err());
}

#[tokio::test]
async fn test_dot_segment_ids_never_reach_transport() {
    for token_id in [".", ".."] {
        let transport = StubTransport::json(StatusCode::OK, token_123());
        let err = resolver(transport.clone()).resolve(token_id).await.unwrap_err();

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", token_id);
        assert_eq!(err.message(), MSG_TRANSPORT_FAILURE, "{}", token_id);
        assert!(transport.calls().is_empty(), "{}", token_id);
    }
}

#[test]
fn test_resolver_rejects_cannot_be_a_base_url() {
    let base = Url::parse("mailto:oauth@example.com").unwrap();
    assert!(RemoteTokenResolver::new(base, StubTransport::failing()).is_err());
}

// --- authenticator ---------------------------------------------------------

#[tokio::test]
async fn test_authenticate_absent_request() {
    let transport = StubTransport::failing();
    let result = authenticator(transport.clone())
        .authenticate::<Request<Body>>(None)
        .await;

    assert!(result.is_ok());
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_authenticate_without_token_stays_anonymous() {
    for uri in ["/", "/?access_token=", "/?access_token=%20%20", "/?other=1"] {
        let transport = StubTransport::failing();
        let mut req = request(uri);

        authenticator(transport.clone())
            .authenticate(Some(&mut req))
            .await
            .unwrap();

        assert_eq!(caller_id(Some(&req)), 0, "{}", uri);
        assert_eq!(client_id(Some(&req)), 0, "{}", uri);
        assert!(transport.calls().is_empty(), "{}", uri);
    }
}

#[tokio::test]
async fn test_authenticate_injects_identity() {
    let transport = StubTransport::json(StatusCode::OK, token_123());
    let mut req = request("/?access_token=123");

    authenticator(transport).authenticate(Some(&mut req)).await.unwrap();

    assert_eq!(req.headers().get(HEADER_X_CALLER_ID).unwrap(), "123");
    assert_eq!(req.headers().get(HEADER_X_CLIENT_ID).unwrap(), "123");
    assert_eq!(caller_id(Some(&req)), 123);
    assert_eq!(client_id(Some(&req)), 123);
}

#[tokio::test]
async fn test_authenticate_trims_token() {
    let transport = StubTransport::json(StatusCode::OK, token_123());
    let mut req = request("/?access_token=%20abc%20");

    authenticator(transport.clone())
        .authenticate(Some(&mut req))
        .await
        .unwrap();

    assert_eq!(transport.calls()[0].path(), "/oauth/access_token/abc");
}

#[tokio::test]
async fn test_authenticate_unknown_token_is_anonymous() {
    let transport = StubTransport::json(
        StatusCode::NOT_FOUND,
        serde_json::to_value(RestError::not_found("Not found")).unwrap(),
    );
    let mut req = request("/?access_token=123");

    authenticator(transport).authenticate(Some(&mut req)).await.unwrap();

    assert!(req.headers().get(HEADER_X_CALLER_ID).is_none());
    assert!(req.headers().get(HEADER_X_CLIENT_ID).is_none());
}

#[tokio::test]
async fn test_authenticate_surfaces_broken_service() {
    let transport = StubTransport::raw(StatusCode::INTERNAL_SERVER_ERROR, "not json");
    let mut req = request("/?access_token=123");

    let err = authenticator(transport)
        .authenticate(Some(&mut req))
        .await
        .unwrap_err();

    assert_eq!(err.message(), MSG_UNPARSABLE_REMOTE_ERROR);
    assert!(req.headers().get(HEADER_X_CALLER_ID).is_none());
}

#[tokio::test]
async fn test_authenticate_surfaces_transport_failure() {
    let mut req = request("/?access_token=123");

    let err = authenticator(StubTransport::failing())
        .authenticate(Some(&mut req))
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.message(), MSG_TRANSPORT_FAILURE);
}

#[tokio::test]
async fn test_authenticate_surfaces_remote_non_404_verbatim() {
    let remote = RestError::unauthorized("token expired");
    let transport = StubTransport::json(
        StatusCode::UNAUTHORIZED,
        serde_json::to_value(&remote).unwrap(),
    );
    let mut req = request("/?access_token=123");

    let err = authenticator(transport)
        .authenticate(Some(&mut req))
        .await
        .unwrap_err();
    assert_eq!(err, remote);
}

#[tokio::test]
async fn test_authenticate_removes_spoofed_headers() {
    let mut req = request("/");
    req.headers_mut()
        .insert(HEADER_X_CALLER_ID, HeaderValue::from_static("1"));
    req.headers_mut()
        .insert(HEADER_X_CLIENT_ID, HeaderValue::from_static("1"));

    let auth = authenticator(StubTransport::failing());
    auth.authenticate(Some(&mut req)).await.unwrap();

    assert!(req.headers().get(HEADER_X_CALLER_ID).is_none());
    assert!(req.headers().get(HEADER_X_CLIENT_ID).is_none());

    sanitize(Some(&mut req));
    assert!(req.headers().get(HEADER_X_CALLER_ID).is_none());
}

#[tokio::test]
async fn test_spoofed_headers_replaced_not_appended() {
    let transport = StubTransport::json(
        StatusCode::OK,
        json!({"id": "abc", "user_id": 42, "client_id": 7}),
    );
    let mut req = request("/?access_token=abc");
    req.headers_mut()
        .insert(HEADER_X_CALLER_ID, HeaderValue::from_static("1"));

    authenticator(transport).authenticate(Some(&mut req)).await.unwrap();

    let callers: Vec<&str> = req
        .headers()
        .get_all(HEADER_X_CALLER_ID)
        .iter()
        .map(|value| value.to_str().unwrap())
        .collect();
    assert_eq!(callers, vec!["42"]);
    assert_eq!(client_id(Some(&req)), 7);
}

/// Resolver that never hits a transport, for the 404 special case
struct NotFoundResolver;

#[async_trait]
impl AccessTokenResolver for NotFoundResolver {
    async fn resolve(&self, _token_id: &str) -> crate::core::error::RestResult<AccessToken> {
        Err(crate::core::classify::classify(&crate::core::classify::RecordNotFound))
    }
}

#[tokio::test]
async fn test_classified_not_found_is_anonymous() {
    let auth = Authenticator::new(Arc::new(NotFoundResolver));
    let mut req = request("/?access_token=gone");

    assert!(auth.authenticate(Some(&mut req)).await.is_ok());
    assert_eq!(caller_id(Some(&req)), 0);
}
