//! request-mirror
//!
//! Forwards every request to a primary upstream and mirrors admitted
//! requests to a secondary endpoint.
//!
//! ```text
//!   client ──▶ listener ──▶ MirrorHandler ──▶ primary upstream ──▶ client
//!                              │
//!                              └─(admitted, detached)──▶ mirror target
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use request_mirror::config::cli::MirrorArgs;
use request_mirror::config::loader::{load_config, ConfigError};
use request_mirror::config::validation::validate_config;
use request_mirror::config::AppConfig;
use request_mirror::http::HttpServer;
use request_mirror::lifecycle::{signals, Shutdown};
use request_mirror::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "request-mirror")]
#[command(about = "Forward requests to an upstream and mirror them to a second endpoint", long_about = None)]
struct Cli {
    /// TOML configuration file; all other flags are ignored when set
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to accept client traffic on
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Primary upstream host:port
    #[arg(long, default_value = "127.0.0.1:3000")]
    upstream: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(flatten)]
    mirror: MirrorArgs,
}

impl Cli {
    fn into_config(self) -> Result<AppConfig, ConfigError> {
        if let Some(path) = self.config {
            return load_config(&path);
        }

        let mut config = AppConfig::default();
        config.listener.bind_address = self.listen;
        config.upstream.address = self.upstream;
        config.observability.log_level = self.log_level;
        config.mirror = self.mirror.into();
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("request-mirror v{} starting", env!("CARGO_PKG_VERSION"));

    let mirror = validate_config(&config).map_err(ConfigError::Validation)?;
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        mirror = %mirror,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, mirror)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move { signals::shutdown_on_ctrl_c(&shutdown).await });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
