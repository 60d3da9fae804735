//! Keepalive server binary

use anyhow::{Context, Result};
use http_tcp_keepalive::config::{ConfigReloader, ConfigReloaderConfig, DEFAULT_LISTEN};
use http_tcp_keepalive::keepalive::{Capabilities, Tunables};
use http_tcp_keepalive::server::Server;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_NAME: &str = "keepalive-server";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut listen_addr: Option<String> = None;
    let mut watch = true;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                config_path = Some(PathBuf::from(
                    args.next().context("Expected config file after -c")?,
                ));
            }
            "-l" | "--listen" => {
                listen_addr = Some(args.next().context("Expected listen address after -l")?);
            }
            "--no-watch" => {
                watch = false;
            }
            "-V" | "--version" => {
                println!("{APP_NAME} {VERSION}");
                return Ok(());
            }
            "-h" | "--help" => {
                println!("Usage: {APP_NAME} -c FILE [OPTIONS]");
                println!("Options:");
                println!("  -c, --config FILE      Configuration file (required)");
                println!("  -l, --listen ADDRESS   Override the listen address (default: {DEFAULT_LISTEN})");
                println!("      --no-watch         Do not reload the configuration on change");
                println!("  -V, --version          Show version information");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {
                error!("Unknown argument: {}", arg);
                return Err(anyhow::anyhow!("Unknown argument: {}", arg));
            }
        }
    }

    let config_path = config_path.context("Config file is required (use -c or --config)")?;

    let reloader = ConfigReloader::new(ConfigReloaderConfig {
        path: config_path.clone(),
        watch_enabled: watch,
        ..ConfigReloaderConfig::default()
    })
    .with_context(|| format!("Failed to load configuration: {}", config_path.display()))?;
    let reloader = Arc::new(reloader);

    let caps = Capabilities::current();
    if caps.tunables == Tunables::IdleOnly {
        warn!("[Server] Platform only supports the idle option; tcp_keepcnt and tcp_keepintvl are ignored");
    }

    Arc::clone(&reloader)
        .start_watching()
        .context("Failed to watch configuration file")?;

    let listen_addr = listen_addr.unwrap_or_else(|| reloader.listen().to_string());

    info!("[Server] {APP_NAME} v{VERSION}");
    info!("[Server] Global scope: {}", reloader.current().global());

    let server = Server::new_with_reloadable_config(reloader.shared());
    server
        .listen(&listen_addr)
        .await
        .context("Failed to start server")?;

    Ok(())
}
