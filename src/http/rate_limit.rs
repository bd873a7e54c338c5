//! Rate limiting middleware for HTTP requests.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::debug;

use super::remote_addr;
use crate::ratelimit::{ClientIdentity, ClientRegistry};

/// Layer that admits or rejects requests using a [`ClientRegistry`].
#[derive(Clone)]
pub struct RateLimitLayer {
    registry: Arc<ClientRegistry>,
}

impl RateLimitLayer {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, next: S) -> Self::Service {
        RateLimitService {
            next,
            registry: Arc::clone(&self.registry),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    next: S,
    registry: Arc<ClientRegistry>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let identity = client_identity(&req);

        if self.registry.check(&identity) {
            // The clone may not be ready; call the instance that was polled.
            let clone = self.next.clone();
            let mut next = std::mem::replace(&mut self.next, clone);
            return Box::pin(next.call(req));
        }

        debug!(
            client = %identity,
            method = %req.method(),
            path = %req.uri().path(),
            "Request rejected due to rate limit"
        );

        Box::pin(async { Ok(too_many_requests()) })
    }
}

/// Identity of the client that sent `req`.
fn client_identity<B>(req: &Request<B>) -> ClientIdentity {
    match remote_addr(req) {
        Some(addr) => ClientIdentity::from_remote_addr(&addr),
        None => {
            debug!("Request has no remote address, rate limiting as unknown client");
            ClientIdentity::unknown()
        }
    }
}

fn too_many_requests() -> Response<Body> {
    (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests\n").into_response()
}
