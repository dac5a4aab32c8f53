//! Prometheus metrics for the signaling relay.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    frames: IntCounterVec,
    errors: IntCounterVec,
    dropped: IntCounter,
    connections: IntGauge,
    rooms: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let frames = IntCounterVec::new(
            Opts::new("campus_signal_frames_total", "Inbound frames by type"),
            &["type"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new("campus_signal_errors_total", "Frame handling errors by kind"),
            &["kind"],
        )?;
        let dropped = IntCounter::new(
            "campus_signal_dropped_total",
            "Outbound frames dropped because the target connection is gone",
        )?;
        let connections = IntGauge::new("campus_signal_connections", "Open signaling connections")?;
        let rooms = IntGauge::new("campus_signal_rooms", "Rooms with at least one live peer")?;

        registry.register(Box::new(frames.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(dropped.clone()))?;
        registry.register(Box::new(connections.clone()))?;
        registry.register(Box::new(rooms.clone()))?;

        Ok(Self {
            registry,
            frames,
            errors,
            dropped,
            connections,
            rooms,
        })
    }

    pub fn record_frame(&self, tag: &str) {
        self.frames.with_label_values(&[tag]).inc();
    }

    pub fn record_error(&self, kind: &str) {
        self.errors.with_label_values(&[kind]).inc();
    }

    pub fn record_dropped(&self) {
        self.dropped.inc();
    }

    pub fn set_connections(&self, count: usize) {
        self.connections.set(count as i64);
    }

    pub fn set_rooms(&self, count: usize) {
        self.rooms.set(count as i64);
    }

    pub fn connections(&self) -> i64 {
        self.connections.get()
    }

    /// Prometheus text exposition
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
