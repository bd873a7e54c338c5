//! HTTP server implementation.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::handlers::{self, AppState};
use super::middleware;
use crate::error::Result;
use crate::fortune::FortuneBackend;
use crate::ratelimit::ClientRegistry;

/// Default time allowed for in-flight requests once shutdown starts.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the application: every route behind the full middleware chain.
pub fn router(
    backend: Arc<dyn FortuneBackend>,
    registry: Arc<ClientRegistry>,
    request_timeout: Duration,
) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/fortune", get(handlers::get_fortune))
        .route("/fortune/files", get(handlers::list_files))
        .route("/fortune/search", get(handlers::search_fortunes))
        .with_state(AppState::new(backend));

    middleware::apply(routes, registry, request_timeout)
}

/// HTTP server for the fortune API.
pub struct HttpServer {
    /// Address to bind to
    addr: String,
    /// The application to serve
    app: Router,
    /// Grace period for draining requests on shutdown
    shutdown_timeout: Duration,
}

impl HttpServer {
    /// Create a server that will bind to `addr`.
    pub fn new(addr: impl Into<String>, app: Router) -> Self {
        Self {
            addr: addr.into(),
            app,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the grace period for in-flight requests.
    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// Bind the configured address and serve until `shutdown` is cancelled.
    pub async fn serve_with_shutdown(self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(&self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            e
        })?;

        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled.
    ///
    /// Once cancelled, new connections are refused and in-flight requests
    /// get the shutdown timeout to finish before the server gives up on them.
    pub async fn serve_on(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Starting HTTP server");

        let server = axum::serve(
            listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                return result.map_err(|e| {
                    error!(error = %e, "HTTP server failed");
                    e.into()
                });
            }
            _ = shutdown.cancelled() => {}
        }

        info!(grace_period = ?self.shutdown_timeout, "Draining in-flight requests");

        match tokio::time::timeout(self.shutdown_timeout, server).await {
            Ok(result) => result?,
            Err(_) => warn!(
                grace_period = ?self.shutdown_timeout,
                "Shutdown grace period elapsed, dropping open connections"
            ),
        }

        info!("HTTP server stopped");
        Ok(())
    }
}
