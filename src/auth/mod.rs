pub mod authenticator;
pub mod middleware;
pub mod resolver;
pub mod transport;

#[cfg(test)]
mod tests;

pub use authenticator::{
    caller_id, client_id, is_public, sanitize, Authenticator, CallerIdentity, InboundRequest,
    TrustHeaders,
};
pub use middleware::authenticate_request;
pub use resolver::{AccessToken, AccessTokenResolver, RemoteTokenResolver};
pub use transport::{HttpTransport, ReqwestTransport, TransportError, TransportResponse};
