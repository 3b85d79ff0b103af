//! # OAuth Interceptor - Main Entry Point
//!
//! Runs a small service with the authentication middleware in front of an
//! identity-echo route, so the interceptor can be exercised end to end.

use axum::{middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use oauth_interceptor::observability::init_logging;
use oauth_interceptor::{
    authenticate_request, Authenticator, CallerIdentity, InterceptorConfig, RemoteTokenResolver,
    ReqwestTransport, RestError, RestResult,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Interceptor failed: {}", e);
        eprintln!("oauth-interceptor: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> RestResult<()> {
    let config_path = std::env::var("INTERCEPTOR_CONFIG_PATH")
        .unwrap_or_else(|_| "config/interceptor.yaml".to_string());
    let config = InterceptorConfig::load_or_default(&config_path).await?;

    init_logging(&config.logging);
    info!("Starting oauth-interceptor {}", env!("CARGO_PKG_VERSION"));

    let app = build_app(&config)?;

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RestError::config(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RestError::internal(format!("Server error: {}", e)))?;

    info!("oauth-interceptor shutdown complete");
    Ok(())
}

fn build_app(config: &InterceptorConfig) -> RestResult<Router> {
    let transport = ReqwestTransport::new(config.oauth.timeout)
        .map_err(|e| RestError::config(e.to_string()))?;
    let resolver = RemoteTokenResolver::new(config.oauth.base_url()?, Arc::new(transport))?;
    let authenticator = Arc::new(Authenticator::new(Arc::new(resolver)));

    Ok(Router::new()
        .route("/whoami", get(whoami))
        .layer(middleware::from_fn_with_state(authenticator, authenticate_request))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http()))
}

async fn whoami(identity: CallerIdentity) -> Json<Value> {
    Json(json!({
        "caller_id": identity.caller_id,
        "client_id": identity.client_id,
        "public": identity.public,
        "anonymous": identity.is_anonymous(),
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
