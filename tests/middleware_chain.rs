//! End-to-end tests of the request pipeline in front of the fortune routes.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use tower::ServiceExt;

use fortune_api::error::Result;
use fortune_api::fortune::{FortuneBackend, FortuneOptions, FortuneResponse, SearchResponse};
use fortune_api::http::router;
use fortune_api::ratelimit::ClientRegistry;

struct FixedBackend;

#[async_trait]
impl FortuneBackend for FixedBackend {
    async fn fortune(&self, _options: &FortuneOptions) -> Result<FortuneResponse> {
        Ok(FortuneResponse::new("You will write many tests."))
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        Ok(vec!["wisdom".to_string()])
    }

    async fn search(&self, pattern: &str, _options: FortuneOptions) -> Result<SearchResponse> {
        Ok(SearchResponse::new(vec![FortuneResponse::new(pattern)]))
    }
}

/// In-memory sink for JSON log lines.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    /// Fields of every request log entry, in the order they were written.
    fn requests(&self) -> Vec<serde_json::Value> {
        let bytes = self.0.lock().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
            .filter(|entry| entry["fields"]["message"] == "HTTP Request")
            .map(|entry| entry["fields"].clone())
            .collect()
    }
}

fn app(registry: Arc<ClientRegistry>) -> Router {
    router(Arc::new(FixedBackend), registry, Duration::from_secs(15))
}

fn request(method: Method, uri: &str, peer: &str) -> Request<Body> {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let addr: SocketAddr = peer.parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_burst_rejection_and_recovery() {
    let registry = Arc::new(ClientRegistry::new());
    let app = app(Arc::clone(&registry));

    for i in 0..4 {
        let req = request(Method::GET, "/fortune", "203.0.113.5:40000");
        let (status, _, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK, "request {} should be allowed", i + 1);
    }

    let req = request(Method::GET, "/fortune", "203.0.113.5:40001");
    let (status, headers, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, "Too Many Requests\n");
    // Rejections still carry CORS headers.
    assert_eq!(headers["access-control-allow-origin"], "*");

    tokio::time::sleep(Duration::from_secs(1)).await;

    let req = request(Method::GET, "/fortune", "203.0.113.5:40002");
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("You will write many tests."));
}

#[tokio::test(start_paused = true)]
async fn test_limit_is_per_client() {
    let registry = Arc::new(ClientRegistry::new());
    let app = app(Arc::clone(&registry));

    for _ in 0..5 {
        send(&app, request(Method::GET, "/health", "203.0.113.5:40000")).await;
    }

    let req = request(Method::GET, "/health", "203.0.113.6:40000");
    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(registry.contains("203.0.113.5"));
    assert!(registry.contains("203.0.113.6"));
}

#[tokio::test]
async fn test_preflight_is_not_rate_limited() {
    let registry = Arc::new(ClientRegistry::new());
    let app = app(Arc::clone(&registry));

    let req = request(Method::OPTIONS, "/fortune", "198.51.100.1:1234");
    let (status, headers, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(
        headers["access-control-allow-methods"],
        "GET, POST, PUT, DELETE, OPTIONS"
    );
    assert_eq!(
        headers["access-control-allow-headers"],
        "Content-Type, Authorization"
    );
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_preflight_succeeds_for_limited_client() {
    let registry = Arc::new(ClientRegistry::new());
    let app = app(Arc::clone(&registry));

    for _ in 0..5 {
        send(&app, request(Method::GET, "/fortune", "198.51.100.1:1234")).await;
    }

    let req = request(Method::OPTIONS, "/fortune", "198.51.100.1:1234");
    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_passes_through() {
    let registry = Arc::new(ClientRegistry::new());
    let app = app(Arc::clone(&registry));

    let req = request(Method::GET, "/nope", "198.51.100.2:1234");
    let (status, headers, _) = send(&app, req).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_search_requires_pattern_through_pipeline() {
    let app = app(Arc::new(ClientRegistry::new()));

    let req = request(Method::GET, "/fortune/search", "198.51.100.3:1234");
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["error"], "Missing required parameter");
}

#[tokio::test]
async fn test_every_request_is_logged_once_in_chain_order() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let registry = Arc::new(ClientRegistry::new());
    let app = app(Arc::clone(&registry));
    let peer = "192.0.2.44:5555";

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let (status, _, _) = send(&app, request(Method::GET, "/fortune?short=true", peer)).await;
        statuses.push(status.as_u16());
    }
    let (status, _, _) = send(&app, request(Method::OPTIONS, "/fortune", peer)).await;
    statuses.push(status.as_u16());
    assert_eq!(statuses, [200, 200, 200, 200, 429, 200]);

    let entries = logs.requests();
    assert_eq!(entries.len(), 6);

    let logged: Vec<_> = entries.iter().map(|e| e["status_code"].clone()).collect();
    assert_eq!(logged, [200, 200, 200, 200, 429, 200]);

    let rejected = &entries[4];
    assert_eq!(rejected["method"], "GET");
    assert_eq!(rejected["path"], "/fortune");
    assert_eq!(rejected["query"], "short=true");
    assert_eq!(rejected["remote_addr"], peer);

    let preflight = &entries[5];
    assert_eq!(preflight["method"], "OPTIONS");
    assert_eq!(preflight["status_code"], 200);
}
