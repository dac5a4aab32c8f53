use clap::Parser;
use std::path::PathBuf;

use campus_signal::config;

#[derive(Parser, Debug)]
#[command(name = "campus-signal")]
#[command(author = "Campus Team")]
#[command(version)]
#[command(about = "WebSocket signaling relay for study rooms and calls", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/campus-signal.toml")]
    pub config: PathBuf,

    /// HTTP bind address
    #[arg(long)]
    pub host: Option<String>,

    /// HTTP / WebSocket port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Shared secret relays must present when declaring themselves
    #[arg(long, env = "CAMPUS_SIGNAL_RELAY_TOKEN")]
    pub relay_token: Option<String>,

    /// Verbose logging
    #[arg(short, long, action)]
    pub verbose: bool,
}

impl Args {
    pub fn load_config(&self) -> Result<config::Config, Box<dyn std::error::Error>> {
        config::Config::load(&self.config)
    }

    /// Apply command line overrides on top of the file configuration
    pub fn apply_overrides(&self, config: &mut config::Config) {
        if let Some(ref host) = self.host {
            config.http.host = host.clone();
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(ref token) = self.relay_token {
            config.relay.token = Some(token.clone());
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
    }
}
