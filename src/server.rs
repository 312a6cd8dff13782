//! HTTP transport: the two download endpoints on an axum router.
//!
//! ```text
//! POST /api/download-pdf   {"urls": [...]}  → application/pdf
//! POST /api/download-zip   {"urls": [...]}  → application/zip
//! ```
//!
//! Every response carries permissive CORS headers and `OPTIONS` is answered
//! with an empty 200. Anything other than `POST` is a 405; a body without a
//! `urls` array is a 400. Everything past validation is delegated to
//! [`crate::bundle::bundle_with`] and [`crate::response::compose`].

use crate::bundle::bundle_with;
use crate::config::BundleConfig;
use crate::error::BundleError;
use crate::orchestrator::Orchestrator;
use crate::output::BundleMode;
use crate::response::{compose, compose_error, BundleResponse, ResponseBody};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, FromRequest, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Request bodies above this size are rejected with 413.
pub const DEFAULT_BODY_LIMIT: usize = 50 * 1024 * 1024;

const CORS_HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-credentials", "true"),
    ("access-control-allow-origin", "*"),
    (
        "access-control-allow-methods",
        "GET,OPTIONS,PATCH,DELETE,POST,PUT",
    ),
    (
        "access-control-allow-headers",
        "X-CSRF-Token, X-Requested-With, Accept, Accept-Version, Content-Length, \
         Content-MD5, Content-Type, Date, X-Api-Version",
    ),
];

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Maximum accepted request body in bytes. Default: 50 MB.
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// Shared across requests. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    config: Arc<BundleConfig>,
    orchestrator: Arc<Orchestrator>,
    body_limit: usize,
}

impl AppState {
    pub fn new(config: BundleConfig, body_limit: usize) -> Result<Self, BundleError> {
        let orchestrator = Orchestrator::from_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            body_limit,
        })
    }
}

/// Build the router with both endpoints, the body limit and CORS.
pub fn router(state: AppState) -> Router {
    let body_limit = state.body_limit;
    Router::new()
        .route("/api/download-pdf", any(download_pdf))
        .route("/api/download-zip", any(download_zip))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Bind `server.bind` and serve until Ctrl-C.
pub async fn serve(server: ServerConfig, config: BundleConfig) -> Result<(), BundleError> {
    let state = AppState::new(config, server.body_limit)?;
    let listener = tokio::net::TcpListener::bind(server.bind)
        .await
        .map_err(|e| BundleError::Internal(format!("Failed to bind {}: {}", server.bind, e)))?;
    let local = listener
        .local_addr()
        .map_err(|e| BundleError::Internal(e.to_string()))?;
    info!("Listening on http://{}", local);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| BundleError::Internal(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn download_pdf(State(state): State<AppState>, request: Request) -> Response {
    handle(state, BundleMode::Pdf, request).await
}

async fn download_zip(State(state): State<AppState>, request: Request) -> Response {
    handle(state, BundleMode::Zip, request).await
}

async fn handle(state: AppState, mode: BundleMode, request: Request) -> Response {
    // Method first: the body limit only applies to POSTs.
    if request.method() != Method::POST {
        return compose_error(&BundleError::MethodNotAllowed, mode).into_response();
    }
    let body = match Bytes::from_request(request, &state).await {
        Ok(body) => body,
        Err(rejection) => return rejection.into_response(),
    };
    let urls = match parse_urls(&body) {
        Ok(urls) => urls,
        Err(e) => return compose_error(&e, mode).into_response(),
    };

    info!("{:?} request with {} URLs", mode, urls.len());
    let result = bundle_with(&state.orchestrator, mode, urls, &state.config).await;
    if let Err(e) = &result {
        error!("{:?} request failed: {}", mode, e);
    }
    compose(result, mode).into_response()
}

/// Pull the `urls` array out of a JSON body.
///
/// Entries that are not strings are kept as their JSON text so they fail
/// individually as invalid URLs instead of rejecting the whole request.
pub fn parse_urls(body: &[u8]) -> Result<Vec<String>, BundleError> {
    let required = || BundleError::Validation("URLs array required".into());
    let value: Value = serde_json::from_slice(body).map_err(|_| required())?;
    let urls = value.get("urls").and_then(Value::as_array).ok_or_else(required)?;
    Ok(urls
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect())
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };
    apply_cors(response.headers_mut());
    response
}

fn apply_cors(headers: &mut HeaderMap) {
    for (name, value) in CORS_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
}

impl IntoResponse for BundleResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = match self.body {
            ResponseBody::Binary(bytes) => bytes.into_response(),
            ResponseBody::Json(value) => Json(value).into_response(),
        };
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Dropping unrepresentable header {}: {}", name, value),
            }
        }
        response
    }
}
