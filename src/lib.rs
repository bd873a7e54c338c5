//! Fortune API - HTTP Service for the `fortune` Command
//!
//! This crate serves fortunes over HTTP. Every request passes through a
//! logging, CORS and per-client token-bucket rate limiting pipeline before
//! reaching a handler, and idle clients are periodically forgotten.

pub mod config;
pub mod error;
pub mod fortune;
pub mod http;
pub mod ratelimit;
