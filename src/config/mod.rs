//! Configuration management for campus-signal

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Signaling endpoint configuration
    #[serde(default)]
    pub signaling: SignalingConfig,

    /// Relay declaration policy
    #[serde(default)]
    pub relay: RelayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// HTTP bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port for signaling, health and metrics
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingConfig {
    /// WebSocket endpoint path
    #[serde(default = "default_path")]
    pub path: String,

    /// Largest accepted text frame in bytes
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Shared secret relays must present when declaring themselves.
    /// Unset leaves relay declaration open to any connection.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.http.port == 0 {
            return Err("HTTP port must be non-zero".into());
        }

        if !self.signaling.path.starts_with('/') {
            return Err("Signaling path must start with '/'".into());
        }

        if RESERVED_PATHS.contains(&self.signaling.path.as_str()) {
            return Err(format!(
                "Signaling path {} is already served by the HTTP endpoints",
                self.signaling.path
            )
            .into());
        }

        if self.signaling.max_frame_bytes == 0 {
            return Err("Signaling max_frame_bytes must be non-zero".into());
        }

        if let Some(ref token) = self.relay.token {
            if token.trim().is_empty() {
                return Err("Relay token is set but empty".into());
            }
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !["off", "error", "warn", "info", "debug", "trace"].contains(&level.as_str()) {
            return Err(format!("Unknown log level: {}", self.logging.level).into());
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}

/// Paths taken by the HTTP endpoints
pub const RESERVED_PATHS: &[&str] = &["/health", "/metrics", "/stats"];

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_path() -> String {
    "/ws".to_string()
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}
