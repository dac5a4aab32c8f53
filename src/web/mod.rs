//! HTTP server for health checks, metrics and signaling
//!
//! Provides a lightweight axum server for monitoring and the WebSocket endpoint.

pub mod shared;
pub use shared::SharedState;

pub mod http_server;
pub use http_server::{build_router, run_http_server};
