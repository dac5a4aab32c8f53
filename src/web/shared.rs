//! Shared state for the HTTP and WebSocket handlers.

use crate::config::Config;
use crate::metrics::Metrics;
use crate::signaling::Router;
use crate::transport::{HubHandle, SignalingHub};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct SharedState {
    /// Configuration
    pub config: Arc<Config>,

    /// Handle to the signaling hub task
    pub hub: HubHandle,

    /// Prometheus metrics
    pub metrics: Arc<Metrics>,

    /// Server start time
    pub start_time: Instant,
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("config", &self.config)
            .field("connections", &self.metrics.connections())
            .finish()
    }
}

impl SharedState {
    /// Build the router, spawn the hub task and wrap everything for the handlers.
    /// Must be called from inside a tokio runtime.
    pub fn start(config: Config) -> Result<(Arc<Self>, JoinHandle<()>), prometheus::Error> {
        let metrics = Arc::new(Metrics::new()?);
        let router = Router::new(config.relay.token.clone(), config.signaling.max_frame_bytes);
        let (hub, task) = SignalingHub::new(router, metrics.clone()).spawn();

        let state = Arc::new(Self {
            config: Arc::new(config),
            hub,
            metrics,
            start_time: Instant::now(),
        });
        Ok((state, task))
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn connection_count(&self) -> i64 {
        self.metrics.connections()
    }
}
