//! Request logging and CORS interceptors, and the order they run in.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    USER_AGENT,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{from_fn, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::time::Instant;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use super::rate_limit::RateLimitLayer;
use super::remote_addr;
use crate::ratelimit::ClientRegistry;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Wrap `router` in the request pipeline.
///
/// From the outside in: logging, CORS, rate limiting, request timeout.
pub fn apply(router: Router, registry: Arc<ClientRegistry>, request_timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(from_fn(log_requests))
            .layer(from_fn(cors))
            .layer(RateLimitLayer::new(registry))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                request_timeout,
            )),
    )
}

/// Log one entry per request once the rest of the chain has produced a response.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or_default().to_string();
    let remote_addr = remote_addr(&req).unwrap_or_default();
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = next.run(req).await;

    info!(
        method = %method,
        path = %path,
        query = %query,
        remote_addr = %remote_addr,
        user_agent = %user_agent,
        status_code = response.status().as_u16(),
        duration = ?start.elapsed(),
        "HTTP Request"
    );

    response
}

/// Allow any origin; answer preflight requests without going further.
pub async fn cors(req: Request, next: Next) -> Response {
    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));

    response
}
