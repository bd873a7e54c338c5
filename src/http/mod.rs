//! HTTP surface: routes, middleware and the server.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

mod handlers;
pub mod middleware;
mod rate_limit;
mod server;

pub use handlers::{AppState, ApiError, ErrorResponse, FilesResponse, FortuneQuery};
pub use rate_limit::{RateLimitLayer, RateLimitService};
pub use server::{router, HttpServer};

/// Transport address of the peer that sent `req`, if the server recorded one.
pub(crate) fn remote_addr<B>(req: &Request<B>) -> Option<String> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
}
