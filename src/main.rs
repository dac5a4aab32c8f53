//! campus-signal - Main entry point
//!
//! WebSocket signaling relay coordinating offer/answer/ICE exchange between
//! study room participants and the declared relay peers.

mod args;

use args::Args;
use campus_signal::config::Config;
use campus_signal::web::{self, SharedState};
use clap::Parser;
use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration before logging so the file can set the level
    let loaded = args.load_config();
    let mut config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => Config::default(),
    };
    args.apply_overrides(&mut config);

    env_logger::Builder::new()
        .parse_filters(
            &std::env::var("CAMPUS_SIGNAL_LOG").unwrap_or_else(|_| config.logging.level.clone()),
        )
        .init();

    info!("campus-signal v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) if args.config.exists() => info!("Loaded configuration from {:?}", args.config),
        Ok(_) => info!("No configuration file at {:?}, using defaults", args.config),
        Err(e) => warn!("Failed to load config: {}, using defaults", e),
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e);
    }

    if config.relay.token.is_none() {
        warn!("No relay token configured: any connection may declare itself a relay");
    }

    let listener = TcpListener::bind(config.bind_addr()).await?;
    let (state, hub_task) = SharedState::start(config)?;

    web::run_http_server(listener, state, shutdown_signal()).await?;

    hub_task.abort();
    info!("campus-signal stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down..."),
        Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
    }
}
