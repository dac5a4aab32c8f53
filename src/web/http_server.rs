//! HTTP server for health checks, metrics and WebSocket signaling
//!
//! Provides health check endpoints, metrics, a state snapshot, and the
//! signaling WebSocket upgrade.

use crate::transport::handle_signaling_connection;
use crate::web::shared::SharedState;
use axum::{
    body::Body,
    extract::{State, WebSocketUpgrade},
    http::{header, StatusCode},
    response::Response,
    routing::get,
};
use log::{error, info};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Alias path the front end also connects to
const SIGNALING_ALIAS: &str = "/signaling";

/// Build the HTTP router
pub fn build_router(state: Arc<SharedState>) -> axum::Router {
    let path = state.config.signaling.path.clone();

    let mut app = axum::Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .route(&path, get(signaling_handler));

    if path != SIGNALING_ALIAS {
        app = app.route(SIGNALING_ALIAS, get(signaling_handler));
    }

    app.with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn run_http_server<F>(
    listener: TcpListener,
    state: Arc<SharedState>,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(
        "Signaling endpoint at ws://{}{} (alias {})",
        addr, state.config.signaling.path, SIGNALING_ALIAS
    );
    info!("HTTP server listening on http://{}", addr);

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;

    Ok(())
}

async fn signaling_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<SharedState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_signaling_connection(socket, state))
}

/// Health check handler
async fn health_handler(State(state): State<Arc<SharedState>>) -> Response {
    let payload = json!({
        "status": "healthy",
        "uptime_seconds": state.uptime().as_secs_f64(),
        "connections": state.connection_count(),
        "version": env!("CARGO_PKG_VERSION"),
    });
    json_response(StatusCode::OK, payload.to_string())
}

/// Metrics handler (Prometheus format)
async fn metrics_handler(State(state): State<Arc<SharedState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(text))
            .unwrap_or_else(|_| Response::new(Body::empty())),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            plain_response(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable")
        }
    }
}

/// Snapshot of connections, rooms and relay slots
async fn stats_handler(State(state): State<Arc<SharedState>>) -> Response {
    match state.hub.snapshot().await {
        Some(snapshot) => match serde_json::to_string(&snapshot) {
            Ok(body) => json_response(StatusCode::OK, body),
            Err(e) => {
                error!("Failed to serialize stats: {}", e);
                plain_response(StatusCode::INTERNAL_SERVER_ERROR, "stats unavailable")
            }
        },
        None => plain_response(StatusCode::SERVICE_UNAVAILABLE, "signaling hub stopped"),
    }
}

fn json_response(status: StatusCode, body: String) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn plain_response(status: StatusCode, body: &'static str) -> Response {
    Response::builder()
        .status(status)
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
