// src/server/mod.rs

//! HTTP surface: router, shared state, CORS, and response helpers.

pub mod handlers;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::cache::ResponseCache;
use crate::error::Result;
use crate::intake::{LeadStore, MemoryLeadStore};
use crate::models::AppConfig;
use crate::providers::socrata::SocrataClient;
use crate::registry::SchemaRegistry;

/// Shared application state behind every handler.
pub struct AppState {
    pub config: AppConfig,
    pub registry: SchemaRegistry,
    pub client: SocrataClient,
    pub cache: ResponseCache,
    pub leads: Arc<dyn LeadStore>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = SocrataClient::new(&config.http, config.upstream.app_token.clone())?;
        let cache = ResponseCache::new(config.cache.history_ttl_secs);
        Ok(Self {
            config,
            registry: SchemaRegistry::builtin(),
            client,
            cache,
            leads: Arc::new(MemoryLeadStore::new()),
        })
    }
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/v1/health", get(handlers::health))
        .route("/api/radar", get(handlers::radar))
        .route("/api/top", get(handlers::top_permits))
        .route("/api/top-permits", get(handlers::top_permits))
        .route("/api/address-pulse", get(handlers::address_pulse))
        .route(
            "/api/pilot-intake",
            post(handlers::pilot_intake).fallback(method_not_allowed),
        )
        .route(
            "/pilot-intake",
            post(handlers::pilot_intake).fallback(method_not_allowed),
        )
        .route("/v1/jurisdictions", get(handlers::jurisdictions))
        .route(
            "/v1/history/search",
            get(handlers::history_search).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> Response {
    json_response(&json!({ "ok": false, "error": "not_found" }), StatusCode::NOT_FOUND)
}

async fn method_not_allowed() -> Response {
    json_response(
        &json!({ "ok": false, "error": "method_not_allowed" }),
        StatusCode::METHOD_NOT_ALLOWED,
    )
}

/// Plain JSON response. Uncached by default; the history view overrides
/// the cache-control header explicitly.
pub(crate) fn json_response(value: &Value, status: StatusCode) -> Response {
    raw_json_response(value.to_string(), status)
}

pub(crate) fn raw_json_response(body: String, status: StatusCode) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "application/json; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response()
}

/// Error payload in the `{ok, error, detail}` shape.
pub(crate) fn error_response(
    message: &str,
    detail: Option<&str>,
    status: StatusCode,
) -> Response {
    json_response(
        &json!({ "ok": false, "error": message, "detail": detail }),
        status,
    )
}

/// JSON response cacheable by shared caches for `ttl_secs`.
pub(crate) fn cacheable_json_response(body: String, ttl_secs: u64) -> Response {
    let mut response = raw_json_response(body, StatusCode::OK);
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age=0, s-maxage={ttl_secs}")) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    response
}

/// CORS for browser consumers. Requests from an unlisted origin are
/// answered with the first configured origin rather than rejected, so
/// responses never carry a wildcard.
async fn cors(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    if request.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        apply_cors_headers(
            response.headers_mut(),
            &state.config.cors.allowed_origins,
            &origin,
        );
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(
        response.headers_mut(),
        &state.config.cors.allowed_origins,
        &origin,
    );
    response
}

fn apply_cors_headers(headers: &mut HeaderMap, allowed_origins: &[String], origin: &str) {
    let allow = if allowed_origins.iter().any(|allowed| allowed == origin) {
        origin
    } else {
        allowed_origins.first().map(String::as_str).unwrap_or("")
    };

    if let Ok(value) = HeaderValue::from_str(allow) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type, authorization"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
    headers.insert(header::VARY, HeaderValue::from_static("origin"));
}
